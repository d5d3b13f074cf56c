mod cancellation;
mod client;
mod dial;
mod dispatch;
mod error;
mod fingerprint;
mod gemtext;
mod mask;
mod params;
mod resolve;
mod tofu;
mod verification;

pub use cancellation::CancellationToken;
pub use client::Control;
pub use dial::{AlwaysConfirm, TofuPrompt};
pub use dispatch::LineKind;
pub use error::{GeminiClientError, Result};
pub use gemtext::{LinkNode, ListNode, Node, NodeType, TextNode};
pub use mask::TrustMask;
pub use params::{Params, StaticParams};
pub use resolve::resolve;
pub use tofu::{TofuLookup, TofuStore};
