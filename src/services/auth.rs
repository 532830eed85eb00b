use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::repositories::user::UserRepository;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 2;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;

/// Same message for unknown email and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hashes a password using Argon2id with a random salt.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Lower-cases and trims an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a new user.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `email` - The user's email address.
/// * `password` - The user's password.
/// * `token_allowance` - Messages granted before a subscription is needed.
///
/// # Returns
///
/// A `Result` containing the created `User`, or `DuplicateEmail`.
pub async fn register_user(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
    token_allowance: i32,
) -> Result<User> {
    let email = normalize_email(email);
    tracing::debug!("🔐 Creating user: {}", email);

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    let user = users.create_user(&email, &password_hash, token_allowance).await?;

    tracing::info!("✅ User created with ID: {}", user.id);
    Ok(user)
}

/// Authenticates a user.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `email` - The user's email address.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the authenticated `User`.
pub async fn authenticate_user(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<User> {
    let email = normalize_email(email);
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(user)
}
