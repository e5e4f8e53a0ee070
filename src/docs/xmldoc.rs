use std::{collections::HashMap, fmt, path::Path};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    docs::{method_doc_id, method_doc_stem, property_doc_id, DocumentationProvider},
    metadata::{member::MethodDesc, types::TypeRef},
    Error, Result,
};

/// Maps a documented exception's full name to a type reference.
pub type TypeResolver = dyn Fn(&str) -> Option<TypeRef> + Send + Sync;

#[derive(Debug, Clone, Default)]
struct DocEntry {
    assembly: String,
    exceptions: Vec<String>,
}

/// Documented exceptions read from compiler-generated XML documentation files.
///
/// Only members with at least one `<exception cref="T:..."/>` element are kept.
/// Exception types are resolved through the optional [`TypeResolver`]; without one, or
/// when it does not know a name, the type is attributed to the assembly named by the
/// documentation file.
///
/// # Examples
///
/// ```rust
/// use throwscope::docs::XmlDocProvider;
///
/// let mut docs = XmlDocProvider::new();
/// docs.load_str(r#"<?xml version="1.0"?>
/// <doc>
///   <assembly><name>App</name></assembly>
///   <members>
///     <member name="M:App.Store.Open(System.String)">
///       <exception cref="T:System.IO.FileNotFoundException">missing</exception>
///     </member>
///   </members>
/// </doc>"#)?;
///
/// assert_eq!(docs.len(), 1);
/// assert_eq!(
///     docs.documented("M:App.Store.Open(System.String)"),
///     Some(&["System.IO.FileNotFoundException".to_string()][..])
/// );
/// # Ok::<(), throwscope::Error>(())
/// ```
#[derive(Default)]
pub struct XmlDocProvider {
    members: HashMap<String, DocEntry>,
    overloads: HashMap<String, Vec<String>>,
    resolver: Option<Box<TypeResolver>>,
}

impl XmlDocProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every readable file in `paths`, skipping (and logging) the others.
    #[must_use]
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut provider = Self::new();
        for path in paths {
            let path = path.as_ref();
            match provider.load_file(path) {
                Ok(count) => log::debug!("{}: {count} documented members", path.display()),
                Err(e) => log::warn!("skipping documentation file {}: {e}", path.display()),
            }
        }
        provider
    }

    /// Sets the resolver used to turn exception names into type references.
    #[must_use]
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<TypeRef> + Send + Sync + 'static,
    {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Number of members with documented exceptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Exception names documented under the exact documentation id `id`.
    #[must_use]
    pub fn documented(&self, id: &str) -> Option<&[String]> {
        self.members.get(id).map(|entry| entry.exceptions.as_slice())
    }

    /// Reads one documentation file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise see
    /// [`XmlDocProvider::load_str`].
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Reads documentation from a string and returns the number of members added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] for malformed XML and [`Error::Documentation`] if the
    /// document does not name its assembly.
    pub fn load_str(&mut self, xml: &str) -> Result<usize> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut assembly: Option<String> = None;
        let mut in_assembly = false;
        let mut in_assembly_name = false;
        let mut current: Option<(String, Vec<String>)> = None;
        let mut parsed: Vec<(String, Vec<String>)> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"assembly" => in_assembly = true,
                    b"name" if in_assembly => in_assembly_name = true,
                    b"member" => current = attribute(&e, "name")?.map(|id| (id, Vec::new())),
                    b"exception" => push_exception(&e, current.as_mut())?,
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"member" => {}
                    b"exception" => push_exception(&e, current.as_mut())?,
                    _ => {}
                },
                Event::Text(text) if in_assembly_name => {
                    assembly = Some(text.unescape()?.trim().to_string());
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"assembly" => in_assembly = false,
                    b"name" => in_assembly_name = false,
                    b"member" => {
                        if let Some(member) = current.take() {
                            if !member.1.is_empty() {
                                parsed.push(member);
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        let Some(assembly) = assembly else {
            return Err(Error::Documentation(
                "documentation file does not name its assembly".to_string(),
            ));
        };

        let added = parsed.len();
        for (id, exceptions) in parsed {
            self.insert(id, assembly.clone(), exceptions);
        }
        Ok(added)
    }

    fn insert(&mut self, id: String, assembly: String, exceptions: Vec<String>) {
        if let Some(stem) = id.strip_prefix("M:") {
            let stem = format!("M:{}", stem.split_once('(').map_or(stem, |(s, _)| s));
            let ids = self.overloads.entry(stem).or_default();
            if !ids.contains(&id) {
                ids.push(id.clone());
            }
        }

        let entry = self.members.entry(id).or_default();
        entry.assembly = assembly;
        for exception in exceptions {
            if !entry.exceptions.contains(&exception) {
                entry.exceptions.push(exception);
            }
        }
    }

    /// The method's own entry: the exact id, or the only overload with its name when
    /// the exact id cannot be formed or is not documented.
    fn method_entry(&self, method: &MethodDesc) -> Option<&DocEntry> {
        if let Some(entry) = method_doc_id(method).and_then(|id| self.members.get(&id)) {
            return Some(entry);
        }
        match self.overloads.get(&method_doc_stem(method))?.as_slice() {
            [only] => self.members.get(only),
            _ => None,
        }
    }

    fn resolve(&self, name: &str, assembly: &str) -> TypeRef {
        self.resolver
            .as_ref()
            .and_then(|resolve| resolve(name))
            .unwrap_or_else(|| TypeRef::parse(assembly, name))
    }
}

impl DocumentationProvider for XmlDocProvider {
    fn exceptions(&self, method: &MethodDesc) -> Result<Vec<TypeRef>> {
        let property = property_doc_id(method).and_then(|id| self.members.get(&id));

        let mut types: Vec<TypeRef> = Vec::new();
        for entry in self.method_entry(method).into_iter().chain(property) {
            for name in &entry.exceptions {
                let ty = self.resolve(name, &entry.assembly);
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
        Ok(types)
    }
}

impl fmt::Debug for XmlDocProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocProvider")
            .field("members", &self.members.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    match element
        .try_get_attribute(key)
        .map_err(quick_xml::Error::from)?
    {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Records a `T:` exception reference; unresolved (`!:`) references are dropped.
fn push_exception(element: &BytesStart<'_>, member: Option<&mut (String, Vec<String>)>) -> Result<()> {
    let Some((_, exceptions)) = member else {
        return Ok(());
    };
    if let Some(cref) = attribute(element, "cref")? {
        if let Some(name) = cref.strip_prefix("T:") {
            exceptions.push(name.to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{
        metadata::member::MethodKind,
        test::method_id,
    };

    const STORE_XML: &str = r#"<?xml version="1.0"?>
<doc>
    <assembly>
        <name>App</name>
    </assembly>
    <members>
        <member name="T:App.Store">
            <summary>A store.</summary>
        </member>
        <member name="M:App.Store.Open(System.String)">
            <summary>Opens.</summary>
            <exception cref="T:System.IO.FileNotFoundException">missing file</exception>
            <exception cref="T:System.ArgumentNullException"/>
        </member>
        <member name="M:App.Store.Close">
            <exception cref="!:Unresolved">broken reference</exception>
        </member>
        <member name="M:App.Store.Flush(System.Boolean)">
            <exception cref="T:System.IO.IOException"/>
        </member>
        <member name="M:App.Store.Read(System.Int32)">
            <exception cref="T:System.ArgumentException"/>
        </member>
        <member name="M:App.Store.Read(System.Int64)">
            <exception cref="T:System.NotSupportedException"/>
        </member>
        <member name="M:App.Store.#ctor">
            <exception cref="T:System.InvalidOperationException"/>
        </member>
        <member name="P:App.Store.Length">
            <exception cref="T:System.NotSupportedException"/>
        </member>
    </members>
</doc>"#;

    fn provider() -> XmlDocProvider {
        let mut docs = XmlDocProvider::new();
        assert_eq!(docs.load_str(STORE_XML).unwrap(), 6);
        docs
    }

    fn method(name: &str, params: &[&str]) -> MethodDesc {
        let mut desc = MethodDesc::new(method_id(1), TypeRef::parse("App", "App.Store"), name);
        desc.parameters = params
            .iter()
            .map(|p| Some(TypeRef::parse("mscorlib", p)))
            .collect();
        desc
    }

    fn names(types: &[TypeRef]) -> Vec<String> {
        types.iter().map(TypeRef::fullname).collect()
    }

    #[test]
    fn test_exact_id() {
        let docs = provider();
        let types = docs.exceptions(&method("Open", &["System.String"])).unwrap();
        assert_eq!(
            names(&types),
            vec!["System.IO.FileNotFoundException", "System.ArgumentNullException"]
        );
        assert_eq!(types[0].assembly, "App");
    }

    #[test]
    fn test_unique_overload_fallback() {
        let docs = provider();

        let mut flush = method("Flush", &[]);
        flush.parameters = vec![None];
        assert_eq!(
            names(&docs.exceptions(&flush).unwrap()),
            vec!["System.IO.IOException"]
        );

        let mut read = method("Read", &[]);
        read.parameters = vec![None];
        assert!(docs.exceptions(&read).unwrap().is_empty());
    }

    #[test]
    fn test_constructor_and_property() {
        let docs = provider();

        let mut ctor = method(".ctor", &[]);
        ctor.kind = MethodKind::Constructor;
        assert_eq!(
            names(&docs.exceptions(&ctor).unwrap()),
            vec!["System.InvalidOperationException"]
        );

        let mut getter = method("get_Length", &[]);
        getter.kind = MethodKind::PropertyGetter;
        assert_eq!(
            names(&docs.exceptions(&getter).unwrap()),
            vec!["System.NotSupportedException"]
        );
    }

    #[test]
    fn test_unresolved_crefs_dropped() {
        let docs = provider();
        assert!(docs.documented("M:App.Store.Close").is_none());
        assert!(docs.exceptions(&method("Close", &[])).unwrap().is_empty());
    }

    #[test]
    fn test_resolver() {
        let docs = provider().with_resolver(|name| {
            name.starts_with("System.").then(|| TypeRef::parse("mscorlib", name))
        });
        let types = docs.exceptions(&method("Open", &["System.String"])).unwrap();
        assert!(types.iter().all(|ty| ty.assembly == "mscorlib"));
    }

    #[test]
    fn test_missing_assembly_name() {
        let mut docs = XmlDocProvider::new();
        let result = docs.load_str("<doc><members/></doc>");
        assert!(matches!(result, Err(Error::Documentation(_))));
    }

    #[test]
    fn test_from_files_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("App.xml");
        let bad = dir.path().join("Broken.xml");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(STORE_XML.as_bytes())
            .unwrap();
        std::fs::File::create(&bad)
            .unwrap()
            .write_all(b"<doc><members>")
            .unwrap();
        let missing = dir.path().join("Missing.xml");

        let docs = XmlDocProvider::from_files(&[good, bad, missing]);
        assert_eq!(docs.len(), 6);
    }
}
