pub mod session;
pub mod token;

pub use session::{PersistedSession, Session, UserProfile};
pub use token::{AccessToken, RefreshResponse, SignInRequest, SignInResponse};
