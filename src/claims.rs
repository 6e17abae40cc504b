//! Interpretation of verifier claims.
//!
//! Two questions are asked of a verification result:
//!
//! 1. Does the customer hold a discount-relevant identity (student, senior)?
//! 2. Which invoice carrier or transit card number should go on the receipt?
//!
//! The first is answered from the partial schema. The second walks the raw
//! payload, since the verifier may nest claims directly under a credential
//! or under its `credentialSubject`.

use crate::reference::ReferenceCode;
use crate::verifier::VerificationResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// Credential types that carry a carrier or card identifier.
const CARRIER_CREDENTIAL_TYPES: [&str; 2] = [
    ReferenceCode::InvoiceCode.as_str(),
    ReferenceCode::EasyCard.as_str(),
];

/// Internal field names of identifier claims.
const RECOGNIZED_ENAMES: [&str; 2] = ["invoicenum", "easycard_ID"];

/// Display names of identifier claims.
const RECOGNIZED_CNAMES: [&str; 2] = ["載具條碼", "卡號"];

/// Label used when the claim has no display name.
pub const DEFAULT_CARRIER_LABEL: &str = "載具條碼";

/// Identifier printed on the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierIdentifier {
    /// Display label.
    pub label: String,
    /// Identifier value.
    pub value: String,
}

/// Returns true if the verifier vouched for the result and it contains a
/// credential of `credential_type`.
///
/// Nothing is re-verified locally; the upstream verdict is trusted.
#[must_use]
pub fn is_eligible(result: &VerificationResult, credential_type: &str) -> bool {
    result.verified && result.has_credential(credential_type)
}

/// Student discount eligibility.
#[must_use]
pub fn is_student(result: &VerificationResult) -> bool {
    is_eligible(result, ReferenceCode::Student.as_str())
}

/// Senior discount eligibility.
#[must_use]
pub fn is_senior(result: &VerificationResult) -> bool {
    is_eligible(result, ReferenceCode::Senior.as_str())
}

/// Find the carrier or card identifier anywhere in the payload.
///
/// The first carrier credential (depth-first, document order) that yields a
/// claim wins. Within a credential a recognized field name beats a
/// recognized display name, which beats the first non-empty claim. Upstream
/// ordering is undocumented, so with several candidates the pick is best
/// effort.
#[must_use]
pub fn extract_carrier_identifier(result: &VerificationResult) -> Option<CarrierIdentifier> {
    Mappings::new(&result.raw)
        .filter(|node| is_carrier_credential(node))
        .find_map(carrier_from_credential)
}

fn is_carrier_credential(node: &Map<String, Value>) -> bool {
    node.get("credentialType")
        .and_then(Value::as_str)
        .is_some_and(|t| CARRIER_CREDENTIAL_TYPES.contains(&t))
}

fn carrier_from_credential(credential: &Map<String, Value>) -> Option<CarrierIdentifier> {
    let direct = claim_list(credential.get("claims"));
    let nested = credential
        .get("credentialSubject")
        .and_then(Value::as_object)
        .and_then(|subject| claim_list(subject.get("claims")));
    let lists: Vec<&Vec<Value>> = [direct, nested].into_iter().flatten().collect();

    let by_ename = |claim: &Map<String, Value>| text(claim, "ename").is_some_and(|n| RECOGNIZED_ENAMES.contains(&n));
    let by_cname = |claim: &Map<String, Value>| text(claim, "cname").is_some_and(|n| RECOGNIZED_CNAMES.contains(&n));
    let any = |_: &Map<String, Value>| true;

    first_claim(&lists, by_ename)
        .or_else(|| first_claim(&lists, by_cname))
        .or_else(|| first_claim(&lists, any))
}

fn first_claim<F>(lists: &[&Vec<Value>], accept: F) -> Option<CarrierIdentifier>
where
    F: Fn(&Map<String, Value>) -> bool,
{
    lists
        .iter()
        .flat_map(|claims| claims.iter())
        .filter_map(Value::as_object)
        .filter(|claim| accept(claim))
        .find_map(|claim| {
            let value = claim_value(claim.get("value")?)?;
            let label = text(claim, "cname").unwrap_or(DEFAULT_CARRIER_LABEL);
            Some(CarrierIdentifier {
                label: label.to_string(),
                value,
            })
        })
}

fn claim_list(value: Option<&Value>) -> Option<&Vec<Value>> {
    value.and_then(Value::as_array)
}

fn text<'a>(claim: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    claim
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Stringify a scalar claim value; empty strings and non-scalars yield nothing.
fn claim_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A JSON value seen as a tagged union.
enum Node<'a> {
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Scalar,
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Mapping(map),
            Value::Array(items) => Node::Sequence(items),
            _ => Node::Scalar,
        }
    }
}

/// Pre-order, document-order iterator over every mapping in a value.
struct Mappings<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> Mappings<'a> {
    fn new(root: &'a Value) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Mappings<'a> {
    type Item = &'a Map<String, Value>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(value) = self.stack.pop() {
            match Node::from(value) {
                Node::Mapping(map) => {
                    self.stack.extend(map.values().rev());
                    return Some(map);
                }
                Node::Sequence(items) => self.stack.extend(items.iter().rev()),
                Node::Scalar => {}
            }
        }
        None
    }
}
