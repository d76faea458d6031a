use crate::{articles::ArticleId, error::AppError};

pub fn parse_article_id(raw: &str) -> Result<ArticleId, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::MalformedPayload);
    }

    raw.parse().map_err(|_| AppError::MalformedPayload)
}

#[cfg(test)]
mod tests {
    use super::parse_article_id;
    use crate::error::AppError;

    #[test]
    fn test_valid_ids() {
        assert_eq!(parse_article_id("0").unwrap(), 0);
        assert_eq!(parse_article_id("42").unwrap(), 42);
        assert_eq!(parse_article_id("007").unwrap(), 7);
    }

    #[test]
    fn test_invalid_ids() {
        for raw in ["", "-1", "+1", "1.5", "abc", " 1", "99999999999"] {
            assert!(
                matches!(parse_article_id(raw), Err(AppError::MalformedPayload)),
                "{raw:?} should be rejected"
            );
        }
    }
}
