/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The prompt text, sent as a single user turn.
    pub prompt: String,
}

impl ModelRequest {
    /// Creates a request with the given prompt.
    #[inline]
    pub fn new<S: Into<String>>(prompt: S) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}
