use crate::error::OracleError;
use async_trait::async_trait;

/// A text-generation service that turns source text plus instructions into code.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Send one transformation request and return the extracted code text.
    async fn transform(&self, source: &str, instruction: &str) -> Result<String, OracleError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperOracle;

    #[async_trait]
    impl OracleClient for UpperOracle {
        async fn transform(&self, source: &str, _instruction: &str) -> Result<String, OracleError> {
            Ok(source.to_uppercase())
        }

        fn name(&self) -> &str {
            "upper"
        }
    }

    #[tokio::test]
    async fn test_oracle_trait_object() {
        let oracle: Box<dyn OracleClient> = Box::new(UpperOracle);
        assert_eq!(oracle.name(), "upper");
        assert!(oracle.model_info().is_none());
        assert_eq!(oracle.transform("abc", "").await.unwrap(), "ABC");
    }
}
