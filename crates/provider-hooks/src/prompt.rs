use crate::ProviderResult;

/// Interactive input for providers. The CLI implements this on the
/// terminal; tests script the answers.
pub trait Prompter: Send + Sync {
    /// Show `rows` under `columns` and return the zero-based row the user picks.
    fn choose(&self, title: &str, columns: &[&str], rows: &[Vec<String>]) -> ProviderResult<usize>;

    fn text(&self, prompt: &str) -> ProviderResult<String>;

    /// Like [`Prompter::text`] without echoing the input.
    fn secret(&self, prompt: &str) -> ProviderResult<String>;

    /// Progress note while waiting on the user elsewhere (push approval,
    /// browser authorization).
    fn status(&self, message: &str);
}
