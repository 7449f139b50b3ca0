use std::fmt::Debug;

/// Sampling parameters sent with every request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-k sampling. `0` leaves it to the model.
    pub top_k: u32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Upper bound of tokens in the reply.
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

/// Builder for [`GeminiConfig`].
#[derive(Clone, PartialEq)]
pub struct GeminiConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    generation: Option<GenerationParams>,
}

impl GeminiConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            generation: None,
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the sampling parameters.
    #[inline]
    pub fn with_generation_params(mut self, params: GenerationParams) -> Self {
        self.generation = Some(params);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key,
            model: self
                .model
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            base_url: self.base_url.map_or_else(
                || "https://generativelanguage.googleapis.com/v1beta".to_string(),
                |url| url.trim_end_matches('/').to_string(),
            ),
            generation: self.generation.unwrap_or_default(),
        }
    }
}

impl Debug for GeminiConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfigBuilder")
            .field("api_key", &"<deducted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Configuration for the Gemini provider.
#[derive(Clone, PartialEq)]
pub struct GeminiConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) generation: GenerationParams,
}

impl Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<deducted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeminiConfigBuilder::with_api_key("secret")
            .with_base_url("http://localhost:8080/v1beta/")
            .build();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.base_url, "http://localhost:8080/v1beta");
        assert_eq!(config.generation, GenerationParams::default());
        assert!(!format!("{config:?}").contains("secret"));
    }
}
