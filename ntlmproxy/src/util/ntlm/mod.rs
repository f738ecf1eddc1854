pub mod authenticate;
pub mod challenge;
pub mod flags;
mod message;
pub mod negotiate;

pub use authenticate::AuthenticateMessage;
pub use challenge::ChallengeMessage;
pub use flags::NTLMFlags;
pub use negotiate::NegotiateMessage;
