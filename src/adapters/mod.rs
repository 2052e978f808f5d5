//! Adapter interfaces for external collaborators.
//!
//! The cache never renders pages itself; it hands canonical content to a
//! `PageRenderer` and stores whatever comes back.

pub mod markdown;

pub use markdown::MarkdownRenderer;

/// Converts canonical content into presentation output.
///
/// Implementations must be pure: the same input always yields the same
/// output, with no side effects. The cache does not retry a render.
pub trait PageRenderer: Send + Sync {
    /// Render `canonical` for the post named `identity`
    fn render(&self, canonical: &str, identity: &str) -> String;
}

impl<F> PageRenderer for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn render(&self, canonical: &str, identity: &str) -> String {
        self(canonical, identity)
    }
}
