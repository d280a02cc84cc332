use std::fmt;

/// An error that can occur anywhere in sqlweave.
///
/// Errors carry a kind, a rendered message, and an optional cause chain.
/// Context is displayed first, followed by earlier context, ending with the
/// root cause.
pub struct Error {
    inner: Box<ErrorInner>,
}

struct ErrorInner {
    kind: ErrorKind,
    message: String,
    cause: Option<Error>,
}

/// Classifies an [`Error`].
///
/// Bootstrap kinds (`Config` through `CyclicResultMapExtension`) are fatal:
/// the catalog cannot be built. The remaining kinds are raised per
/// invocation and leave the session usable unless the driver reports a
/// broken connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed document, unknown option, or missing required attribute.
    Config,

    /// A forward reference that could not be resolved after the
    /// compilation fixed point.
    IncompleteElement,

    /// An `<include>` chain that references itself.
    CyclicInclude,

    /// A result map `extends` chain that references itself.
    CyclicResultMapExtension,

    /// Parameter could not be read or bound; the statement was never
    /// executed.
    Binding,

    /// The driver failed while executing a statement.
    Execution,

    /// A row cell could not be decoded into the declared property type.
    Mapping,

    /// A property expression that does not tokenize.
    MalformedPath,

    /// Indexed access on a value that is neither a sequence nor a mapping.
    UnindexableNode,

    /// A shape that cannot be instantiated was asked to materialize.
    NoDefaultConstructor,

    /// Conflicting property declarations with unrelated types.
    AmbiguousAccessor,

    /// A cell or parameter value that cannot be converted to the
    /// requested type.
    TypeConversion,

    /// An error surfaced by the driver outside of statement execution.
    Driver,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            inner: Box::new(ErrorInner {
                kind,
                message: message.into(),
                cause: None,
            }),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn incomplete_element(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompleteElement, message)
    }

    pub fn cyclic_include(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CyclicInclude, message)
    }

    pub fn cyclic_result_map(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CyclicResultMapExtension, message)
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Binding, message)
    }

    /// Wraps a driver failure, attaching the offending SQL and the ordered
    /// bound values.
    pub fn execution(
        statement: &str,
        sql: &str,
        values: &[crate::Value],
        cause: Error,
    ) -> Self {
        Self::new(
            ErrorKind::Execution,
            format!("statement `{statement}` failed; sql: {sql}; bound values: {values:?}"),
        )
        .caused_by(cause)
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Mapping, message)
    }

    pub fn malformed_path(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPath, message)
    }

    pub fn unindexable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnindexableNode, message)
    }

    pub fn no_default_constructor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoDefaultConstructor, message)
    }

    pub fn ambiguous_accessor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousAccessor, message)
    }

    pub fn type_conversion(value: &crate::Value, target: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::TypeConversion,
            format!("cannot convert {} to {target}", value.kind_name()),
        )
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Driver, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// Returns true for errors raised during bootstrap; these are fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.inner.kind,
            ErrorKind::Config
                | ErrorKind::IncompleteElement
                | ErrorKind::CyclicInclude
                | ErrorKind::CyclicResultMapExtension
        )
    }

    /// Adds context to this error: `self` becomes the cause of
    /// `consequent`.
    pub fn context(self, consequent: Error) -> Error {
        let mut err = consequent;
        debug_assert!(err.inner.cause.is_none());
        err.inner.cause = Some(self);
        err
    }

    fn caused_by(mut self, cause: Error) -> Error {
        self.inner.cause = Some(cause);
        self
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.cause.as_ref()?;
            Some(err)
        }))
    }
}

impl ErrorKind {
    fn label(&self) -> &'static str {
        match self {
            ErrorKind::Config => "invalid configuration",
            ErrorKind::IncompleteElement => "incomplete element",
            ErrorKind::CyclicInclude => "cyclic include",
            ErrorKind::CyclicResultMapExtension => "cyclic result map extension",
            ErrorKind::Binding => "binding failed",
            ErrorKind::Execution => "execution failed",
            ErrorKind::Mapping => "mapping failed",
            ErrorKind::MalformedPath => "malformed property path",
            ErrorKind::UnindexableNode => "unindexable node",
            ErrorKind::NoDefaultConstructor => "no default constructor",
            ErrorKind::AmbiguousAccessor => "ambiguous accessor",
            ErrorKind::TypeConversion => "type conversion failed",
            ErrorKind::Driver => "driver error",
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            write!(f, "{}: {}", err.inner.kind.label(), err.inner.message)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            fmt::Display::fmt(self, f)
        } else {
            f.debug_struct("Error")
                .field("kind", &self.inner.kind)
                .field("message", &self.inner.message)
                .field("cause", &self.inner.cause)
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        // Ensure Error stays at one word
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn display_single() {
        let err = Error::config("unknown setting `frobnicate`");
        assert_eq!(
            err.to_string(),
            "invalid configuration: unknown setting `frobnicate`"
        );
    }

    #[test]
    fn display_chain() {
        let root = Error::driver("socket reset");
        let top = root.context(Error::binding("while binding parameter 2"));
        assert_eq!(
            top.to_string(),
            "binding failed: while binding parameter 2: driver error: socket reset"
        );
    }

    #[test]
    fn fatal_kinds() {
        assert!(Error::config("x").is_fatal());
        assert!(Error::incomplete_element("x").is_fatal());
        assert!(!Error::binding("x").is_fatal());
        assert!(!Error::mapping("x").is_fatal());
    }

    #[test]
    fn type_conversion_message() {
        let err = Error::type_conversion(&crate::Value::I64(42), "String");
        assert_eq!(
            err.to_string(),
            "type conversion failed: cannot convert I64 to String"
        );
    }
}
