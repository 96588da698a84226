//! Attribute parsing for `#[tcl(...)]`.

use syn::{Attribute, LitStr};

/// Parsed `#[tcl(...)]` attributes on a type.
#[derive(Debug, Default)]
pub struct TypeAttrs {
    /// Override name (default: Rust type name)
    pub name: Option<String>,
}

impl TypeAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("tcl") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().is_empty() {
                        return Err(meta.error("tcl type name must not be empty"));
                    }
                    if value.value().contains(char::is_whitespace) {
                        return Err(meta.error("tcl type name must not contain whitespace"));
                    }
                    result.name = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown tcl attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn name_attribute() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[tcl(name = "Vec2")])];
        let parsed = TypeAttrs::from_attrs(&attrs).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Vec2"));
    }

    #[test]
    fn foreign_attributes_ignored() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[derive(Clone)])];
        assert!(TypeAttrs::from_attrs(&attrs).unwrap().name.is_none());
    }

    #[test]
    fn unknown_key_rejected() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[tcl(color = "red")])];
        let err = TypeAttrs::from_attrs(&attrs).unwrap_err();
        assert!(err.to_string().contains("unknown tcl attribute: color"));
    }

    #[test]
    fn whitespace_name_rejected() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[tcl(name = "a b")])];
        assert!(TypeAttrs::from_attrs(&attrs).is_err());
    }
}
