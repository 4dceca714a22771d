//! Per-request context handed to the pipeline and to hooks.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Query, RawPathParams, Request},
    http::{header, HeaderMap, Method, Uri},
    Form, Json,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Ordered name/value pairs; lookups return the first match.
#[derive(Clone, Debug, Default)]
pub struct FormValues(Vec<(String, String)>);

impl FormValues {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        FormValues(pairs)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Raw path captures such as `id` and `nested_id`.
    pub params: FormValues,
    pub query: FormValues,
    /// Body fields followed by query fields.
    pub form: FormValues,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// JSON objects are accepted too; scalars become their text form and `null` an empty value.
fn json_pairs(body: serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    body.into_iter()
        .filter_map(|(k, v)| {
            let text = match v {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((k, text))
        })
        .collect()
}

/// Text parts of a multipart body. File parts carry no field value and are skipped.
async fn multipart_pairs(mut multipart: Multipart) -> Result<Vec<(String, String)>, AppError> {
    let mut pairs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid multipart field '{}': {}", name, e)))?;
        pairs.push((name, value));
    }
    Ok(pairs)
}

#[async_trait]
impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let params: Vec<(String, String)> = RawPathParams::from_request_parts(&mut parts, state)
            .await
            .map(|p| p.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
            .unwrap_or_default();
        let Query(query): Query<Vec<(String, String)>> = Query::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(format!("invalid query string: {}", e)))?;
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let headers = parts.headers.clone();

        let ct = content_type(&headers);
        let req = Request::from_parts(parts, body);
        let mut pairs: Vec<(String, String)> =
            if ct.starts_with(FORM_CONTENT_TYPE) && method != Method::GET && method != Method::HEAD {
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                pairs
            } else if ct.starts_with("application/json") {
                let Json(body) = Json::<serde_json::Map<String, serde_json::Value>>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                json_pairs(body)
            } else if ct.starts_with(MULTIPART_CONTENT_TYPE) {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                multipart_pairs(multipart).await?
            } else {
                Vec::new()
            };
        pairs.extend(query.iter().cloned());

        Ok(RequestContext {
            method,
            uri,
            headers,
            params: FormValues(params),
            query: FormValues(query),
            form: FormValues(pairs),
        })
    }
}
