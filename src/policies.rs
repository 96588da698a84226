//! Call policies attached to a binding at registration.

/// Extra behavior for one bound callable.
///
/// ```ignore
/// interp.def_with("make_point", make_point, factory("Point"))?;
/// interp.def_with("consume", consume, sink(1).usage("consume point"))?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policies {
    pub(crate) factory: Option<String>,
    pub(crate) sinks: Vec<usize>,
    pub(crate) usage: Option<String>,
    pub(crate) options: Option<String>,
}

impl Policies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the returned object in a handle command of `class`.
    pub fn factory(mut self, class: impl Into<String>) -> Self {
        self.factory = Some(class.into());
        self
    }

    /// After the call, delete the command named by argument `index`
    /// (1-based, counted after the command name). May be given several times.
    pub fn sink(mut self, index: usize) -> Self {
        if !self.sinks.contains(&index) {
            self.sinks.push(index);
        }
        self
    }

    /// Replace argument count errors with `Usage: message`.
    pub fn usage(mut self, message: impl Into<String>) -> Self {
        self.usage = Some(message.into());
        self
    }

    /// Name the option parameters: `"verbose count=3"`.
    pub fn options(mut self, table: impl Into<String>) -> Self {
        self.options = Some(table.into());
        self
    }
}

pub fn factory(class: impl Into<String>) -> Policies {
    Policies::new().factory(class)
}

pub fn sink(index: usize) -> Policies {
    Policies::new().sink(index)
}

pub fn usage(message: impl Into<String>) -> Policies {
    Policies::new().usage(message)
}

pub fn options(table: impl Into<String>) -> Policies {
    Policies::new().options(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_combine() {
        let p = factory("Point").sink(2).sink(1).sink(2).usage("mk x y");
        assert_eq!(p.factory.as_deref(), Some("Point"));
        assert_eq!(p.sinks, vec![2, 1]);
        assert_eq!(p.usage.as_deref(), Some("mk x y"));
        assert!(p.options.is_none());
    }
}
