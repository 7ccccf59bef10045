use std::collections::{BTreeMap, HashMap};

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::GraphSettings;
use crate::error::IndexError;

pub type QueryParams = BTreeMap<String, Value>;

/// Executes one read query to completion and returns every row.
///
/// Implementations must not keep a transaction open between calls.
pub trait GraphClient: Send + Sync {
    fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>, IndexError>;
}

impl<G: GraphClient + ?Sized> GraphClient for &G {
    fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>, IndexError> {
        (**self).execute(query, params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    TextList(Vec<String>),
    PairList(Vec<(String, String)>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        FieldValue::TextList(values.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl TryFrom<&Value> for FieldValue {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::String(text) => Ok(FieldValue::Text(text.clone())),
            Value::Number(number) => number
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| format!("non-integer number {number}")),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_array) => items
                .iter()
                .map(|item| match item.as_array().map(Vec::as_slice) {
                    Some([left, right]) => Ok((pair_part(left)?, pair_part(right)?)),
                    _ => Err(format!("expected a pair, got {item}")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::PairList),
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| match item {
                    Value::String(text) => Ok(text.clone()),
                    Value::Number(number) => Ok(number.to_string()),
                    other => Err(format!("expected a string list element, got {other}")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::TextList),
            other => Err(format!("unsupported value {other}")),
        }
    }
}

fn pair_part(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(format!("unsupported pair element {other}")),
    }
}

/// One result row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Result<&str, IndexError> {
        match self.optional_text(field)? {
            Some(value) => Ok(value),
            None => Err(field_error(field, "is null")),
        }
    }

    pub fn optional_text(&self, field: &str) -> Result<Option<&str>, IndexError> {
        match self.fields.get(field) {
            Some(FieldValue::Text(value)) => Ok(Some(value)),
            Some(FieldValue::Null) => Ok(None),
            Some(other) => Err(field_error(field, &format!("expected text, got {other:?}"))),
            None => Err(field_error(field, "is missing")),
        }
    }

    pub fn integer(&self, field: &str) -> Result<i64, IndexError> {
        match self.fields.get(field) {
            Some(FieldValue::Integer(value)) => Ok(*value),
            Some(other) => Err(field_error(
                field,
                &format!("expected integer, got {other:?}"),
            )),
            None => Err(field_error(field, "is missing")),
        }
    }

    /// Text list; a null field reads as an empty list.
    pub fn text_list(&self, field: &str) -> Result<&[String], IndexError> {
        match self.fields.get(field) {
            Some(FieldValue::TextList(values)) => Ok(values),
            Some(FieldValue::Null) => Ok(&[]),
            Some(other) => Err(field_error(field, &format!("expected list, got {other:?}"))),
            None => Err(field_error(field, "is missing")),
        }
    }

    pub fn pair_list(&self, field: &str) -> Result<&[(String, String)], IndexError> {
        match self.fields.get(field) {
            Some(FieldValue::PairList(pairs)) => Ok(pairs),
            Some(FieldValue::Null) => Ok(&[]),
            Some(FieldValue::TextList(values)) if values.is_empty() => Ok(&[]),
            Some(other) => Err(field_error(
                field,
                &format!("expected pair list, got {other:?}"),
            )),
            None => Err(field_error(field, "is missing")),
        }
    }
}

fn field_error(field: &str, message: &str) -> IndexError {
    IndexError::RecordField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Client for the Neo4j transactional HTTP endpoint. Each `execute` call is a
/// single auto-committed transaction.
#[derive(Clone)]
pub struct Neo4jHttpClient {
    client: Client,
    endpoint: String,
    database: String,
    auth: Option<(String, Option<String>)>,
}

impl Neo4jHttpClient {
    pub fn new(settings: &GraphSettings) -> Result<Self, IndexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pathway-index/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IndexError::GraphHttp(err.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        // Whole-graph traversals can run for a long time; no client-side limit.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|err| IndexError::GraphHttp(err.to_string()))?;

        let auth = settings
            .username
            .as_ref()
            .map(|user| (user.clone(), settings.password.clone()));

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            database: settings.database.clone(),
            auth,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }

    /// Checks that the server answers at all. Used for the startup log only;
    /// queries are attempted regardless of the outcome.
    pub fn probe(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .map_err(|err| IndexError::GraphConnection {
                endpoint: self.endpoint.clone(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(IndexError::GraphConnection {
                endpoint: self.endpoint.clone(),
                message: format!("status {}", response.status().as_u16()),
            });
        }
        Ok(())
    }
}

impl GraphClient for Neo4jHttpClient {
    fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>, IndexError> {
        let body = json!({
            "statements": [{
                "statement": query,
                "parameters": params,
            }]
        });
        let mut request = self
            .client
            .post(self.commit_url())
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, password.as_ref());
        }

        let start = std::time::Instant::now();
        let response = request
            .send()
            .map_err(|err| IndexError::GraphHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "graph request failed".to_string());
            return Err(IndexError::GraphStatus { status, message });
        }
        let payload: Value = response
            .json()
            .map_err(|err| IndexError::GraphHttp(err.to_string()))?;
        let records = parse_response(&payload)?;
        debug!(
            rows = records.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "graph query finished"
        );
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    code: String,
    message: String,
}

/// Converts a transactional endpoint response body into records.
pub fn parse_response(payload: &Value) -> Result<Vec<Record>, IndexError> {
    let response: CommitResponse = serde_json::from_value(payload.clone())
        .map_err(|err| IndexError::GraphHttp(format!("unexpected response: {err}")))?;
    if let Some(error) = response.errors.into_iter().next() {
        return Err(IndexError::GraphQuery {
            code: error.code,
            message: error.message,
        });
    }

    let mut records = Vec::new();
    for result in response.results {
        for data in result.data {
            let mut record = Record::new();
            for (column, value) in result.columns.iter().zip(data.row.iter()) {
                let field = FieldValue::try_from(value)
                    .map_err(|message| field_error(column, &message))?;
                record = record.with(column, field);
            }
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_rows_by_column() {
        let payload = json!({
            "results": [{
                "columns": ["protein", "isoform", "ptms", "physicalEntities", "count"],
                "data": [
                    {"row": ["P01308", null, ["00087:53"], ["R-HSA-1", "R-HSA-2"], 3], "meta": []}
                ]
            }],
            "errors": []
        });

        let records = parse_response(&payload).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.text("protein").unwrap(), "P01308");
        assert_eq!(record.optional_text("isoform").unwrap(), None);
        assert_eq!(record.text_list("ptms").unwrap(), ["00087:53".to_string()]);
        assert_eq!(record.text_list("physicalEntities").unwrap().len(), 2);
        assert_eq!(record.integer("count").unwrap(), 3);
    }

    #[test]
    fn null_list_reads_as_empty() {
        let payload = json!({
            "results": [{
                "columns": ["ptms", "physicalEntities"],
                "data": [{"row": [null, ["E1", null]]}]
            }],
            "errors": []
        });
        let records = parse_response(&payload).unwrap();
        assert!(records[0].text_list("ptms").unwrap().is_empty());
        assert_eq!(records[0].text_list("physicalEntities").unwrap(), ["E1".to_string()]);
    }

    #[test]
    fn nested_arrays_become_pairs() {
        let payload = json!({
            "results": [{
                "columns": ["ptms"],
                "data": [{"row": [[["00046", 12], ["00047", null]]]}]
            }],
            "errors": []
        });
        let records = parse_response(&payload).unwrap();
        let pairs = records[0].pair_list("ptms").unwrap();
        assert_eq!(pairs[0], ("00046".to_string(), "12".to_string()));
        assert_eq!(pairs[1], ("00047".to_string(), "null".to_string()));
    }

    #[test]
    fn statement_errors_become_query_errors() {
        let payload = json!({
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad"}]
        });
        let err = parse_response(&payload).unwrap_err();
        assert_matches!(err, IndexError::GraphQuery { code, .. } if code.ends_with("SyntaxError"));
    }

    #[test]
    fn missing_field_is_reported() {
        let record = Record::new().with("protein", "P1");
        assert_matches!(
            record.text("reaction"),
            Err(IndexError::RecordField { field, .. }) if field == "reaction"
        );
    }
}
