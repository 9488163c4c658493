use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A source file discovered under the project root.
///
/// It stores the path relative to the project (for logs and module names)
/// and the canonicalized, absolute path used as the symbol-table key and for reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedFile {
    pub(crate) display_path: PathBuf,
    pub(crate) canonical_path: PathBuf,
}

impl ResolvedFile {
    pub(crate) fn new(display_path: PathBuf, canonical_path: PathBuf) -> Self {
        Self {
            display_path,
            canonical_path,
        }
    }

    /// Returns the path relative to the project root.
    pub fn display_path(&self) -> &Path {
        &self.display_path
    }

    /// Returns the canonical, absolute path to the file.
    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }
}

/// Source languages the analysis understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Java,
    Python,
}

impl SourceLanguage {
    pub fn extension(self) -> &'static str {
        match self {
            SourceLanguage::Java => "java",
            SourceLanguage::Python => "py",
        }
    }

    /// Tag used on fenced code blocks.
    pub fn fence_tag(self) -> &'static str {
        match self {
            SourceLanguage::Java => "java",
            SourceLanguage::Python => "python",
        }
    }
}

/// A method or constructor declared inside a Java type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    /// Simple name, e.g. `add`.
    pub name: String,
    /// Signature used as the key and as the focal method, e.g. `add(int, int)`.
    pub declaration: String,
    pub is_constructor: bool,
    /// Full text of the declaration, javadoc excluded.
    pub code: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
}

/// A class, interface, enum or record declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    pub qualified_name: String,
    pub callable_declarations: BTreeMap<String, Callable>,
}

/// One parsed `.java` file.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub file: ResolvedFile,
    pub package: Option<String>,
    /// Keyed by qualified name; nested types appear as `pkg.Outer.Inner`.
    pub type_declarations: BTreeMap<String, TypeDeclaration>,
}

/// Java files keyed by canonical path.
pub type SymbolTable = BTreeMap<PathBuf, CompilationUnit>;

/// A top-level Python function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyFunction {
    pub name: String,
    /// Full text of the definition, decorators included.
    pub body: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One parsed `.py` file.
#[derive(Debug, Clone)]
pub struct PyModule {
    pub file: ResolvedFile,
    /// Dotted module name relative to the project root, e.g. `pkg.util`.
    pub name: String,
    pub functions: Vec<PyFunction>,
}

/// A fenced block pulled out of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub language: Option<String>,
}

/// Which inference backend a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// An Ollama server on the local machine.
    Local,
    /// The hosted generative-AI service, reached with credentials from the environment.
    Hosted,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "Ollama"),
            BackendKind::Hosted => write!(f, "watsonx"),
        }
    }
}

/// Result of dispatching one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answer(String),
    /// The backend replied but there was nothing to show (no text, or no code block).
    NoAnswer,
    /// The local backend reported an error; it has already been logged.
    Failed { message: String },
}
