use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    error::{AppError, Result},
    models::payment::{CreatedPayment, PaymentIntent, PaymentRecord},
};

const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_BASE_URL: &str = "https://api-m.paypal.com";

/// The create/find/execute contract of the payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create(&self, intent: &PaymentIntent) -> Result<CreatedPayment>;

    /// `None` if the processor does not know the payment.
    async fn find(&self, payment_id: &str) -> Result<Option<PaymentRecord>>;

    /// Captures an approved payment; returns its state afterwards.
    async fn execute(&self, payment_id: &str, payer_id: &str) -> Result<PaymentRecord>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    intent: &'static str,
    payer: Payer,
    transactions: Vec<Transaction<'a>>,
    redirect_urls: RedirectUrls<'a>,
}

#[derive(Debug, Serialize)]
struct Payer {
    payment_method: &'static str,
}

#[derive(Debug, Serialize)]
struct Transaction<'a> {
    amount: Amount<'a>,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct Amount<'a> {
    total: &'a str,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct RedirectUrls<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    payer_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

/// PayPal REST (v1 payments) client.
pub struct PayPalClient {
    client: Client,
    base_url: String,
    client_id: Zeroizing<String>,
    client_secret: Zeroizing<String>,
}

impl PayPalClient {
    /// `mode` is `live` or anything else for the sandbox.
    pub fn new(mode: &str, client_id: Zeroizing<String>, client_secret: Zeroizing<String>) -> Self {
        let base_url = if mode == "live" { LIVE_BASE_URL } else { SANDBOX_BASE_URL };
        Self::with_base_url(base_url, client_id, client_secret)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        client_id: Zeroizing<String>,
        client_secret: Zeroizing<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            client_id,
            client_secret,
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(self.client_id.as_str(), Some(self.client_secret.as_str()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            tracing::error!(status = %status, "PayPal token request rejected");
            return Err(AppError::Payment("Payment provider authentication failed".to_string()));
        }

        let token: TokenResponse = sonic_rs::from_str(&body)
            .map_err(|e| AppError::Payment(format!("Invalid token response: {}", e)))?;
        Ok(token.access_token)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| AppError::Payment(format!("Failed to read payment response: {}", e)))
}

fn parse_payment(body: &str) -> Result<PaymentResponse> {
    sonic_rs::from_str(body)
        .map_err(|e| AppError::Payment(format!("Invalid payment response: {}", e)))
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create(&self, intent: &PaymentIntent) -> Result<CreatedPayment> {
        let token = self.access_token().await?;
        let body = CreatePaymentBody {
            intent: "sale",
            payer: Payer {
                payment_method: "paypal",
            },
            transactions: vec![Transaction {
                amount: Amount {
                    total: &intent.total,
                    currency: "USD",
                },
                description: &intent.description,
            }],
            redirect_urls: RedirectUrls {
                return_url: &intent.return_url,
                cancel_url: &intent.cancel_url,
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/payments/payment", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Payment creation request failed: {}", e)))?;

        let status = response.status();
        let text = read_body(response).await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "PayPal payment creation rejected");
            return Err(AppError::Payment("Payment creation failed".to_string()));
        }

        let payment = parse_payment(&text)?;
        let approval_url = payment
            .links
            .into_iter()
            .find(|link| link.rel == "approval_url")
            .map(|link| link.href)
            .ok_or_else(|| AppError::Payment("Payment creation failed".to_string()))?;

        Ok(CreatedPayment {
            id: payment.id,
            approval_url,
        })
    }

    async fn find(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/v1/payments/payment/{}", self.base_url, payment_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Payment lookup failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = read_body(response).await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "PayPal payment lookup rejected");
            return Err(AppError::Payment("Payment lookup failed".to_string()));
        }

        let payment = parse_payment(&text)?;
        Ok(Some(PaymentRecord {
            id: payment.id,
            state: payment.state,
        }))
    }

    async fn execute(&self, payment_id: &str, payer_id: &str) -> Result<PaymentRecord> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v1/payments/payment/{}/execute",
                self.base_url, payment_id
            ))
            .bearer_auth(&token)
            .json(&ExecuteBody { payer_id })
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Payment execution request failed: {}", e)))?;

        let status = response.status();
        let text = read_body(response).await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "PayPal payment execution rejected");
            return Err(AppError::Payment("Payment execution failed".to_string()));
        }

        let payment = parse_payment(&text)?;
        Ok(PaymentRecord {
            id: payment.id,
            state: payment.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_approval_link() {
        let body = r#"{
            "id": "PAY-1",
            "state": "created",
            "links": [
                {"href": "https://api/self", "rel": "self", "method": "GET"},
                {"href": "https://paypal/approve?token=EC-1", "rel": "approval_url", "method": "REDIRECT"}
            ]
        }"#;
        let payment = parse_payment(body).unwrap();
        assert_eq!(payment.id, "PAY-1");
        let approval = payment.links.iter().find(|l| l.rel == "approval_url").unwrap();
        assert_eq!(approval.href, "https://paypal/approve?token=EC-1");
    }

    #[test]
    fn mode_selects_host() {
        let live = PayPalClient::new("live", Zeroizing::new("id".into()), Zeroizing::new("s".into()));
        assert_eq!(live.base_url, LIVE_BASE_URL);
        let sandbox = PayPalClient::new("sandbox", Zeroizing::new("id".into()), Zeroizing::new("s".into()));
        assert_eq!(sandbox.base_url, SANDBOX_BASE_URL);
    }
}
