/// A parsed `${key}` or `${key:default}` expression
///
/// The default is split off at the first `:`, so keys cannot contain a colon while
/// defaults may (`${url:http://localhost}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyExpr<'a> {
    pub key: &'a str,
    pub default: Option<&'a str>,
}

impl<'a> PropertyExpr<'a> {
    /// Parses `expr` if it is wrapped in `${` and `}`, returns `None` for plain keys and literals
    pub fn parse(expr: &'a str) -> Option<Self> {
        let inner = expr.strip_prefix("${")?.strip_suffix('}')?;

        Some(match inner.split_once(':') {
            Some((key, default)) => PropertyExpr {
                key,
                default: Some(default),
            },
            None => PropertyExpr {
                key: inner,
                default: None,
            },
        })
    }
}

/// Returns true if `value` uses the placeholder syntax
pub fn is_placeholder(value: &str) -> bool {
    PropertyExpr::parse(value).is_some()
}
