mod apikey;
mod invite;
mod magic_link;
mod perimeter;

pub use apikey::{ApiKeyManager, CreatedApiKey};
pub use invite::InviteFlow;
pub use magic_link::{MagicLinkFlow, RequestedLink};
pub use perimeter::{Credential, IdentityPerimeter};
