use log::warn;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;
use crate::error::Error;

/// Header carrying the management API key.
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Proof that the request presented the configured admin key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminKey;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminKey {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "Config not loaded".to_string()),
            ));
        };

        match req.headers().get_one(ADMIN_KEY_HEADER) {
            Some(key) if keys_match(key, config.admin_key()) => Outcome::Success(AdminKey),
            Some(_) => {
                warn!("Rejected incorrect admin key");
                Outcome::Failure((
                    Status::Unauthorized,
                    Error::Status(Status::Unauthorized, "Incorrect admin key".to_string()),
                ))
            }
            None => Outcome::Failure((
                Status::Unauthorized,
                Error::Status(Status::Unauthorized, "Missing admin key".to_string()),
            )),
        }
    }
}

/// Compare two keys in time that depends only on their lengths.
fn keys_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
