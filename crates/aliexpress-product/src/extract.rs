//! Map the in-page `window.runParams.data` object to a [`ProductExtractionResult`].
//!
//! The marketplace object is loosely typed and any module may be missing,
//! so every lookup goes through [`lookup`], which treats absent and falsy
//! values alike. A falsy value (`null`, `false`, `0`, `NaN`, `""`) moves on
//! to the next fallback, the same way the storefront's own scripts read it.
//! Arrays and objects always count as present.

use serde_json::{Number, Value};

use crate::types::{
    DataNotFound, PageData, ProductExtractionResult, Specification, StoreInfo, Variant,
    VariantOption, DEFAULT_CURRENCY, DEFAULT_TITLE,
};

/// Build the page result from the value of `window.runParams.data`.
///
/// `None`, or a falsy value, yields the not-found sentinel.
pub fn extract_page(data: Option<&Value>) -> PageData {
    match data.filter(|d| is_truthy(d)) {
        Some(data) => PageData::Product(Box::new(extract_product(data))),
        None => {
            tracing::debug!("runParams.data missing from page");
            PageData::NotFound(DataNotFound::default())
        }
    }
}

/// Map a present `runParams.data` object to the output record.
pub fn extract_product(data: &Value) -> ProductExtractionResult {
    let price = lookup(data, &["priceModule", "minActivityAmount", "value"])
        .and_then(number)
        .or_else(|| lookup(data, &["priceModule", "minAmount", "value"]).and_then(number))
        .unwrap_or_else(zero);

    ProductExtractionResult {
        id: lookup(data, &["productId"])
            .and_then(text)
            .unwrap_or_default(),
        titulo: lookup(data, &["titleModule", "subject"])
            .and_then(text)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        preco: price,
        moeda: lookup(data, &["priceModule", "minActivityAmount", "currency"])
            .and_then(text)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        // Entries that are neither strings nor numbers are skipped, so the list
        // can be shorter than the source.
        imagens: list(lookup(data, &["imageModule", "imagePathList"]))
            .iter()
            .filter_map(text)
            .collect(),
        url_descricao: lookup(data, &["descriptionModule", "descriptionUrl"])
            .and_then(text)
            .unwrap_or_default(),
        variacoes: list(lookup(data, &["skuModule", "productSKUPropertyList"]))
            .iter()
            .map(variant)
            .collect(),
        especificacoes: list(lookup(data, &["specsModule", "props"]))
            .iter()
            .map(specification)
            .collect(),
        nota: lookup(data, &["titleModule", "feedbackRating", "averageStar"])
            .and_then(number)
            .unwrap_or_else(zero),
        total_avaliacoes: lookup(data, &["titleModule", "feedbackRating", "totalValidNum"])
            .and_then(number)
            .unwrap_or_else(zero),
        loja: StoreInfo {
            nome: lookup(data, &["storeModule", "storeName"])
                .and_then(text)
                .unwrap_or_default(),
            url: lookup(data, &["storeModule", "storeURL"])
                .and_then(text)
                .unwrap_or_default(),
        },
    }
}

// Entries of the variant and specification lists are copied without
// fallbacks: empty strings and zero ids are kept, only absent values drop.
fn variant(property: &Value) -> Variant {
    Variant {
        tipo: property.get("skuPropertyName").and_then(text),
        // A property without a value list is kept with no options
        // rather than failing the whole product.
        opcoes: list(lookup(property, &["skuPropertyValues"]))
            .iter()
            .map(|value| VariantOption {
                id: value
                    .get("propertyValueId")
                    .filter(|id| !id.is_null())
                    .cloned(),
                nome: value.get("propertyValueName").and_then(text),
                foto: value.get("skuPropertyImagePath").and_then(text),
            })
            .collect(),
    }
}

fn specification(prop: &Value) -> Specification {
    Specification {
        nome: prop.get("attrName").and_then(text),
        valor: prop.get("attrValue").and_then(text),
    }
}

/// Walk `path` from `root`, returning the value only if every step exists
/// and the final value is truthy.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.get(*key))
        .filter(|v| is_truthy(v))
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings pass through; numbers are rendered in their JSON form.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers pass through; numeric strings are parsed.
fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Number::from(i))
            } else {
                s.parse::<f64>().ok().and_then(Number::from_f64)
            }
        }
        _ => None,
    }
}

fn list(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn zero() -> Number {
    Number::from(0)
}
