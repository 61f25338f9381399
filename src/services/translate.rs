use serde_json::Value;

use crate::bot::error::Error;
use crate::utils::retry::retry_once;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// Language the endpoint detected for the input
    pub source_lang: Option<String>,
}

/// Single-shot client for a `client=gtx` style translate endpoint
#[derive(Debug, Clone)]
pub struct TranslateClient {
    http: reqwest::Client,
    url: String,
}

impl TranslateClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    async fn request(&self, target: &str, text: &str) -> Result<Value, Error> {
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::transient(format!("Translate returned {}", status)));
        }
        if !status.is_success() {
            return Err(Error::domain(format!(
                "Could not translate to `{}` (HTTP {})",
                target,
                status.as_u16()
            )));
        }

        Ok(response.json().await?)
    }

    pub async fn translate(&self, target: &str, text: &str) -> Result<Translation, Error> {
        let body = retry_once("translate", || self.request(target, text)).await?;
        parse_response(&body).ok_or_else(|| Error::domain("The translation service returned nothing"))
    }
}

/// `[[["translated", "original", ...], ...], null, "en", ...]`
pub fn parse_response(body: &Value) -> Option<Translation> {
    let segments = body.get(0)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return None;
    }

    Some(Translation {
        text,
        source_lang: body.get(2).and_then(Value::as_str).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_segments() {
        let body: Value = serde_json::from_str(
            r#"[[["Hallo ","Hello ",null,null,10],["Welt","world",null,null,10]],null,"en",null,null,null,1]"#,
        )
        .unwrap();

        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.text, "Hallo Welt");
        assert_eq!(parsed.source_lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        let body: Value = serde_json::from_str(r#"[[], null, "en"]"#).unwrap();
        assert!(parse_response(&body).is_none());
        assert!(parse_response(&Value::Null).is_none());
    }
}
