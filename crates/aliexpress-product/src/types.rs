//! Output data types for an extracted AliExpress product.
//!
//! Field names serialize to the Portuguese keys clients of the `/extrair`
//! endpoint already consume.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Currency reported when the page carries no activity price currency.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Title reported when the page carries no subject.
pub const DEFAULT_TITLE: &str = "Sem título";

/// Message of the sentinel returned when `window.runParams.data` is missing.
pub const DATA_NOT_FOUND: &str = "Dados não encontrados na página";

/// Product fields read from the in-page `runParams.data` object.
///
/// Every field is independently optional upstream and falls back to the
/// default documented on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductExtractionResult {
    /// `productId`, default `""`.
    pub id: String,
    /// `titleModule.subject`, default [`DEFAULT_TITLE`].
    pub titulo: String,
    /// Activity price, then minimum price, default `0`.
    pub preco: Number,
    /// Activity price currency, default [`DEFAULT_CURRENCY`].
    pub moeda: String,
    /// `imageModule.imagePathList`, default empty.
    pub imagens: Vec<String>,
    /// `descriptionModule.descriptionUrl`, default `""`.
    pub url_descricao: String,
    pub variacoes: Vec<Variant>,
    pub especificacoes: Vec<Specification>,
    /// Average feedback star rating, default `0`.
    pub nota: Number,
    /// Number of valid feedback entries, default `0`.
    pub total_avaliacoes: Number,
    pub loja: StoreInfo,
}

impl Default for ProductExtractionResult {
    fn default() -> Self {
        Self {
            id: String::new(),
            titulo: DEFAULT_TITLE.to_string(),
            preco: Number::from(0),
            moeda: DEFAULT_CURRENCY.to_string(),
            imagens: Vec::new(),
            url_descricao: String::new(),
            variacoes: Vec::new(),
            especificacoes: Vec::new(),
            nota: Number::from(0),
            total_avaliacoes: Number::from(0),
            loja: StoreInfo::default(),
        }
    }
}

/// A SKU property (color, size, ...) and its selectable values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    pub opcoes: Vec<VariantOption>,
}

/// One selectable value of a SKU property.
///
/// `id` is passed through untouched since the marketplace serves it as a
/// number on some locales and as a string on others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foto: Option<String>,
}

/// A technical specification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor: Option<String>,
}

/// Seller store reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub nome: String,
    pub url: String,
}

/// Sentinel payload for pages that expose no product data object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNotFound {
    pub erro: String,
}

impl Default for DataNotFound {
    fn default() -> Self {
        Self {
            erro: DATA_NOT_FOUND.to_string(),
        }
    }
}

/// What a rendered product page yielded.
///
/// Both variants are delivered to clients inside the success envelope; a
/// missing data object is not reported as an HTTP error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageData {
    Product(Box<ProductExtractionResult>),
    NotFound(DataNotFound),
}

impl PageData {
    /// The extracted product, if the page exposed one.
    pub fn product(&self) -> Option<&ProductExtractionResult> {
        match self {
            PageData::Product(p) => Some(p),
            PageData::NotFound(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PageData::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_product_uses_documented_fallbacks() {
        let p = ProductExtractionResult::default();
        assert_eq!(p.titulo, "Sem título");
        assert_eq!(p.moeda, "USD");
        assert_eq!(p.preco, Number::from(0));
        assert!(p.imagens.is_empty());
        assert_eq!(p.loja, StoreInfo::default());
    }

    #[test]
    fn test_not_found_serializes_as_bare_erro() {
        let v = serde_json::to_value(PageData::NotFound(DataNotFound::default())).unwrap();
        assert_eq!(v, json!({ "erro": "Dados não encontrados na página" }));
    }

    #[test]
    fn test_absent_option_fields_are_omitted() {
        let opt = VariantOption {
            id: Some(json!(29)),
            nome: Some("Red".into()),
            foto: None,
        };
        let v = serde_json::to_value(&opt).unwrap();
        assert_eq!(v, json!({ "id": 29, "nome": "Red" }));
    }

    #[test]
    fn test_product_keys_match_wire_names() {
        let v = serde_json::to_value(PageData::Product(Box::default())).unwrap();
        let obj = v.as_object().unwrap();
        for key in [
            "id",
            "titulo",
            "preco",
            "moeda",
            "imagens",
            "url_descricao",
            "variacoes",
            "especificacoes",
            "nota",
            "total_avaliacoes",
            "loja",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj.len(), 11);
    }
}
