pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod models {
    pub mod chat;
    pub mod payment;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod chat;
    pub mod memory;
    pub mod session;
    pub mod user;
}

pub mod providers {
    pub mod gemini;
    pub mod paypal;
}

pub mod services {
    pub mod auth;
    pub mod conversation;
    pub mod payment;
    pub mod quota;
    pub mod relay;
}

pub mod handlers {
    pub mod account;
    pub mod auth;
    pub mod chat;
    pub mod payment;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
}
