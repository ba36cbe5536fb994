//! `load` and `dump` conversions between the flat and hierarchical stores
//!
//! `load`: flat file -> decode -> parse -> transcode -> escape `${` ->
//! extract shared sub-trees -> YAML. `dump`: YAML -> expand includes ->
//! interpolate -> flatten -> encode -> flat file. A failing document never
//! stops its siblings; every (server, file) pair gets an outcome in the
//! report.
//!
//! A flat file whose line terminator or byte order mark differs from the
//! default for its encoding (CRLF, BOM only for UTF-16) gets a reserved
//! root key in its document, and `dump` writes that form back:
//!
//! ```yaml
//! ;format:
//!   line_ending: lf
//!   byte_order_mark: true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::{FileSpec, ProjectConfig};
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::flat::{FlatDocument, LineEnding};
use crate::include::{self, IncludeResolver};
use crate::interpolation::{escape_node, interpolate_node};
use crate::storage::Storage;
use crate::text::{has_bom, TextEncoding};
use crate::transcode;
use crate::value::{HierNode, Mapping, ScalarValue};
use crate::yaml;

/// Reserved root key recording the on-disk form of a flat file
pub const FORMAT_KEY: &str = ";format";

/// Line terminator and byte order mark of a flat file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileFormat {
    line_ending: LineEnding,
    bom: bool,
}

impl FileFormat {
    fn default_for(encoding: TextEncoding) -> Self {
        Self {
            line_ending: LineEnding::CrLf,
            bom: encoding.default_bom(),
        }
    }

    /// A file without any line break keeps the default terminator
    fn detect(bytes: &[u8], text: &str, encoding: TextEncoding) -> Self {
        let line_ending = if text.contains('\n') {
            LineEnding::detect(text)
        } else {
            Self::default_for(encoding).line_ending
        };
        Self {
            line_ending,
            bom: has_bom(bytes),
        }
    }

    /// Add the reserved key to `doc` unless this is the default form
    fn record(&self, doc: &mut HierNode, encoding: TextEncoding) {
        if *self == Self::default_for(encoding) {
            return;
        }
        let HierNode::Mapping(root) = doc else { return };

        let mut fields = Mapping::new();
        let ending = match self.line_ending {
            LineEnding::Lf => "lf",
            LineEnding::CrLf => "crlf",
        };
        fields.insert("line_ending".into(), HierNode::string(ending));
        fields.insert("byte_order_mark".into(), HierNode::Scalar(ScalarValue::Bool(self.bom)));
        root.shift_insert(0, FORMAT_KEY.to_string(), HierNode::Mapping(fields));
    }

    /// Remove the reserved key from `doc`; missing fields take the default
    fn take(doc: &mut HierNode, encoding: TextEncoding) -> Result<Self> {
        let mut format = Self::default_for(encoding);
        let HierNode::Mapping(root) = doc else {
            return Ok(format);
        };
        let Some(node) = root.shift_remove(FORMAT_KEY) else {
            return Ok(format);
        };
        let HierNode::Mapping(fields) = node else {
            return Err(Error::parse(format!("`{}` must be a mapping", FORMAT_KEY)).with_path(FORMAT_KEY));
        };

        for (key, value) in &fields {
            match (key.as_str(), value.as_str(), value.as_bool()) {
                ("line_ending", Some("lf"), _) => format.line_ending = LineEnding::Lf,
                ("line_ending", Some("crlf"), _) => format.line_ending = LineEnding::CrLf,
                ("byte_order_mark", _, Some(bom)) => format.bom = bom,
                _ => {
                    return Err(Error::parse(format!("unsupported `{}` setting", key))
                        .with_path(format!("{}.{}", FORMAT_KEY, key))
                        .with_help("line_ending is `lf` or `crlf`, byte_order_mark is true or false"))
                }
            }
        }
        Ok(format)
    }
}

/// Outcome of converting one document
#[derive(Debug, Clone)]
pub enum ConversionStatus {
    /// Written to the given path
    Converted(PathBuf),
    /// Nothing to convert
    Skipped(String),
    Failed(Error),
}

/// One row of a conversion report
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub server: String,
    pub file: String,
    pub status: ConversionStatus,
}

/// Per-document results of a `load` or `dump`
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub outcomes: Vec<ConversionOutcome>,
    /// Include files written by `load`
    pub includes: Vec<PathBuf>,
    /// Include files no server document references after `load`
    pub unused_includes: Vec<PathBuf>,
}

impl ConversionReport {
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ConversionOutcome, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            ConversionStatus::Failed(e) => Some((o, e)),
            _ => None,
        })
    }

    pub fn converted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ConversionStatus::Converted(_)))
            .count()
    }

    fn push(&mut self, server: &str, file: &FileSpec, status: ConversionStatus) {
        self.outcomes.push(ConversionOutcome {
            server: server.to_string(),
            file: file.name.clone(),
            status,
        });
    }
}

/// Runs conversions between the two stores
pub struct Pipeline<'a> {
    config: &'a ProjectConfig,
    storage: &'a dyn Storage,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ProjectConfig, storage: &'a dyn Storage) -> Self {
        Self { config, storage }
    }

    /// Convert flat files of `servers` into hierarchical documents
    pub fn load(&self, servers: &[String]) -> ConversionReport {
        let mut report = ConversionReport::default();

        for file in &self.config.files {
            let mut loaded: Vec<(&str, HierNode, FileFormat)> = Vec::new();

            for server in servers {
                let path = self.config.flat_path(server, file);
                match self.read_flat(&path, file) {
                    Ok(Some((node, format))) => loaded.push((server.as_str(), node, format)),
                    Ok(None) => {
                        log::info!("{}: no {} to load", server, path.display());
                        report.push(server, file, ConversionStatus::Skipped("no flat file".into()));
                    }
                    Err(e) => {
                        log::warn!("{}: failed to load {}", server, path.display());
                        report.push(server, file, ConversionStatus::Failed(located(e, &path)));
                    }
                }
            }

            if loaded.is_empty() {
                continue;
            }

            let mut names = Vec::with_capacity(loaded.len());
            let mut docs = Vec::with_capacity(loaded.len());
            let mut formats = Vec::with_capacity(loaded.len());
            for (name, doc, format) in loaded {
                names.push(name);
                docs.push(doc);
                formats.push(format);
            }
            let mut extraction = include::extract(docs, file.stem(), &self.config.extract);

            let include_result = self.place_includes(&mut extraction.documents, extraction.includes);
            let written = match include_result {
                Ok(written) => written,
                Err(e) => {
                    for server in names {
                        report.push(server, file, ConversionStatus::Failed(e.clone()));
                    }
                    continue;
                }
            };
            report.includes.extend(written);

            let documents = extraction.documents.iter_mut().zip(formats);
            for (server, (doc, format)) in names.into_iter().zip(documents) {
                format.record(doc, file.encoding);
                let path = self.config.hier_path(server, file);
                let status = match self.write_yaml(&path, doc) {
                    Ok(()) => {
                        log::debug!("{}: wrote {}", server, path.display());
                        ConversionStatus::Converted(path)
                    }
                    Err(e) => ConversionStatus::Failed(located(e, &path)),
                };
                report.push(server, file, status);
            }
        }

        match self.unused_includes() {
            Ok(unused) => {
                for path in &unused {
                    log::warn!("Include {} is not referenced by any document", path.display());
                }
                report.unused_includes = unused;
            }
            Err(e) => log::warn!("Could not check for unused includes: {}", e),
        }

        self.sort(&mut report, servers);
        report
    }

    /// Convert hierarchical documents of `servers` back into flat files
    pub fn dump(&self, servers: &[String], env: &Environment) -> ConversionReport {
        let mut report = ConversionReport::default();
        let resolver = IncludeResolver::new(self.storage, self.config.includes_path());
        let known: HashSet<String> = self.config.files.iter().map(FileSpec::hier_name).collect();

        for server in servers {
            self.warn_unknown_documents(server, &known);

            for file in &self.config.files {
                let path = self.config.hier_path(server, file);
                let status = match self.dump_one(&path, file, server, &resolver, env) {
                    Ok(Some(out)) => {
                        log::debug!("{}: wrote {}", server, out.display());
                        ConversionStatus::Converted(out)
                    }
                    Ok(None) => {
                        log::info!("{}: no {} to dump", server, path.display());
                        ConversionStatus::Skipped("no hierarchical document".into())
                    }
                    Err(e) => {
                        log::warn!("{}: failed to dump {}", server, path.display());
                        ConversionStatus::Failed(located(e, &path))
                    }
                };
                report.push(server, file, status);
            }
        }

        report
    }

    fn read_flat(&self, path: &Path, file: &FileSpec) -> Result<Option<(HierNode, FileFormat)>> {
        let bytes = match self.storage.read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = file.encoding.decode(&bytes)?;
        let format = FileFormat::detect(&bytes, &text, file.encoding);
        let doc = FlatDocument::parse(&text)?;
        let mut node = transcode::to_hier(&doc)?;
        escape_node(&mut node);
        Ok(Some((node, format)))
    }

    fn read_yaml(&self, path: &Path) -> Result<Option<HierNode>> {
        let bytes = match self.storage.read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = String::from_utf8(bytes).map_err(|e| Error::parse(format!("Invalid UTF-8: {}", e)))?;
        yaml::parse(&text).map(Some)
    }

    fn dump_one(
        &self,
        path: &Path,
        file: &FileSpec,
        server: &str,
        resolver: &IncludeResolver<'_>,
        env: &Environment,
    ) -> Result<Option<PathBuf>> {
        let Some(mut doc) = self.read_yaml(path)? else {
            return Ok(None);
        };
        let format = FileFormat::take(&mut doc, file.encoding)?;
        let mut doc = resolver.expand(&doc)?;
        interpolate_node(&mut doc, env)?;
        let flat = transcode::to_flat(&doc)?;

        let out = self.config.flat_path(server, file);
        let encoded = file
            .encoding
            .encode_with_bom(&flat.to_text(format.line_ending), format.bom);
        self.storage.write(&out, &encoded).map_err(|e| located(e, &out))?;
        Ok(Some(out))
    }

    fn write_yaml(&self, path: &Path, node: &HierNode) -> Result<()> {
        let text = yaml::to_string(node)?;
        self.storage.write(path, text.as_bytes())
    }

    /// Write extracted include files
    ///
    /// An existing include file with identical content is reused. One with
    /// different content is left alone and the new include gets a fresh
    /// name, so documents of servers outside this run keep their meaning.
    fn place_includes(
        &self,
        documents: &mut [HierNode],
        includes: IndexMap<String, HierNode>,
    ) -> Result<Vec<PathBuf>> {
        let dir = self.config.includes_path();
        let mut taken: HashSet<String> = includes.keys().cloned().collect();
        let mut written = Vec::new();

        for (name, node) in includes {
            let mut final_name = name.clone();
            loop {
                let path = dir.join(&final_name);
                match self.storage.read(&path) {
                    Err(e) if e.is_not_found() => {
                        self.write_yaml(&path, &node).map_err(|e| located(e, &path))?;
                        written.push(path);
                        break;
                    }
                    Err(e) => return Err(located(e, &path)),
                    Ok(bytes) => {
                        let existing = String::from_utf8(bytes)
                            .ok()
                            .and_then(|text| yaml::parse(&text).ok());
                        if existing.as_ref() == Some(&node) {
                            log::debug!("Reusing include {}", final_name);
                            break;
                        }
                        final_name = next_free_name(&name, &taken, |candidate| {
                            self.storage.exists(&dir.join(candidate))
                        });
                        taken.insert(final_name.clone());
                    }
                }
            }

            if final_name != name {
                log::info!("Include {} exists with other content, using {}", name, final_name);
                for doc in documents.iter_mut() {
                    rename_include(doc, &name, &final_name);
                }
            }
        }

        Ok(written)
    }

    /// Include files that no document of any configured server reaches,
    /// directly or through other include files
    fn unused_includes(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.includes_path();
        let mut pending = Vec::new();
        for server in &self.config.servers {
            for file in &self.config.files {
                let path = self.config.hier_path(server, file);
                if let Some(doc) = self.read_yaml(&path).map_err(|e| located(e, &path))? {
                    pending.extend(include::references(&doc));
                }
            }
        }

        let mut reached = HashSet::new();
        while let Some(name) = pending.pop() {
            if !reached.insert(name.clone()) {
                continue;
            }
            let path = dir.join(&name);
            if let Some(doc) = self.read_yaml(&path).map_err(|e| located(e, &path))? {
                pending.extend(include::references(&doc));
            }
        }

        Ok(self
            .storage
            .list(&dir)?
            .into_iter()
            .filter(|path| is_yaml(path) && !reached.contains(&file_name(path)))
            .collect())
    }

    fn warn_unknown_documents(&self, server: &str, known: &HashSet<String>) {
        let dir = self.config.hier_dir(server);
        let Ok(entries) = self.storage.list(&dir) else {
            return;
        };
        for entry in entries {
            if is_yaml(&entry) && !known.contains(&file_name(&entry)) {
                log::warn!(
                    "{}: {} has no configured flat counterpart, ignoring",
                    server,
                    entry.display()
                );
            }
        }
    }

    /// Order outcomes by server selection, then configured file order
    fn sort(&self, report: &mut ConversionReport, servers: &[String]) {
        let position = |o: &ConversionOutcome| {
            let s = servers.iter().position(|s| *s == o.server).unwrap_or(usize::MAX);
            let f = self
                .config
                .files
                .iter()
                .position(|f| f.name == o.file)
                .unwrap_or(usize::MAX);
            (s, f)
        };
        report.outcomes.sort_by_key(position);
    }
}

/// Attach the document path unless a real file is already recorded
fn located(e: Error, path: &Path) -> Error {
    let has_file = e
        .source_location
        .as_ref()
        .map(|loc| loc.file != "<input>")
        .unwrap_or(false);
    if has_file {
        e
    } else {
        e.in_file(path.display().to_string())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension().map(|e| e == "yml" || e == "yaml").unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn next_free_name(name: &str, taken: &HashSet<String>, exists: impl Fn(&str) -> bool) -> String {
    let stem = name.strip_suffix(".yml").unwrap_or(name);
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}.yml", stem, n);
        if !taken.contains(&candidate) && !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn rename_include(node: &mut HierNode, from: &str, to: &str) {
    match node {
        HierNode::IncludeRef(path) if path == from => *path = to.to_string(),
        HierNode::Sequence(items) => items.iter_mut().for_each(|i| rename_include(i, from, to)),
        HierNode::Mapping(map) => map.values_mut().for_each(|v| rename_include(v, from, to)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStorage;
    use crate::text::TextEncoding;
    use pretty_assertions::assert_eq;

    fn config() -> ProjectConfig {
        ProjectConfig {
            servers: vec!["Island".into(), "Ragnarok".into(), "Fjordur".into()],
            ..ProjectConfig::default()
        }
    }

    fn servers() -> Vec<String> {
        config().servers
    }

    const GAME_INI: &str = "[/script/shootergame.shootergamemode]\r\n\
        OverridePlayerLevelEngramPoints=50\r\n\
        OverridePlayerLevelEngramPoints=60\r\n\
        PerLevelStatsMultiplier_Player[0]=1.5\r\n\
        \r\n\
        [ModInstaller]\r\n\
        ModIDS=731604991\r\n";

    fn gus(name: &str) -> Vec<u8> {
        let text = format!(
            "[ServerSettings]\r\nDifficultyOffset=1.0\r\nMaxPlayers=70\r\n\r\n[SessionSettings]\r\nSessionName={}\r\n",
            name
        );
        TextEncoding::Utf16.encode(&text)
    }

    #[test]
    fn test_load_then_dump_reproduces_flat_files() {
        let config = config();
        let storage = MemoryStorage::with_files([
            ("configs/ini/Island/Game.ini", GAME_INI.as_bytes().to_vec()),
            ("configs/ini/Ragnarok/Game.ini", GAME_INI.as_bytes().to_vec()),
            ("configs/ini/Island/GameUserSettings.ini", gus("Island")),
            ("configs/ini/Ragnarok/GameUserSettings.ini", gus("Ragnarok")),
        ]);
        let pipeline = Pipeline::new(&config, &storage);

        let loaded = pipeline.load(&servers());
        assert!(!loaded.has_failures(), "{:?}", loaded);
        assert_eq!(loaded.converted(), 4);
        assert!(storage.exists(Path::new("configs/yml/includes/GameUserSettings.ServerSettings.yml")));
        assert!(storage.exists(Path::new(
            "configs/yml/includes/Game.script-shootergame.shootergamemode.yml"
        )));

        let island_gus = String::from_utf8(
            storage.read(Path::new("configs/yml/Island/GameUserSettings.yml")).unwrap(),
        )
        .unwrap();
        assert!(island_gus.contains("!include GameUserSettings.ServerSettings.yml"));

        // wipe the flat store and rebuild it
        let rebuilt = MemoryStorage::new();
        for path in storage.paths() {
            if path.starts_with("configs/yml") {
                rebuilt.write(&path, &storage.read(&path).unwrap()).unwrap();
            }
        }
        let pipeline = Pipeline::new(&config, &rebuilt);
        let dumped = pipeline.dump(&servers(), &Environment::new());
        assert!(!dumped.has_failures(), "{:?}", dumped);

        for path in ["configs/ini/Island/Game.ini", "configs/ini/Ragnarok/Game.ini"] {
            assert_eq!(rebuilt.read(Path::new(path)).unwrap(), GAME_INI.as_bytes());
        }
        assert_eq!(
            rebuilt.read(Path::new("configs/ini/Ragnarok/GameUserSettings.ini")).unwrap(),
            gus("Ragnarok")
        );
    }

    #[test]
    fn test_load_skips_missing_and_isolates_failures() {
        let config = config();
        let storage = MemoryStorage::with_files([
            ("configs/ini/Island/Game.ini", "[S]\nA=1\n".as_bytes().to_vec()),
            ("configs/ini/Ragnarok/Game.ini", "[S]\nbroken line\n".as_bytes().to_vec()),
        ]);
        let report = Pipeline::new(&config, &storage).load(&servers());

        let rows: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| o.file == "Game.ini")
            .map(|o| (o.server.as_str(), &o.status))
            .collect();
        assert!(matches!(rows[0], ("Island", ConversionStatus::Converted(_))));
        assert!(matches!(rows[2], ("Fjordur", ConversionStatus::Skipped(_))));

        let (failed, err) = report.failures().next().unwrap();
        assert_eq!(failed.server, "Ragnarok");
        assert_eq!(err.kind, ErrorKind::MalformedFlatSyntax { line: 2 });
        let loc = err.source_location.as_ref().unwrap();
        assert_eq!(loc.file, "configs/ini/Ragnarok/Game.ini");
        assert_eq!(loc.line, Some(2));
        assert!(storage.exists(Path::new("configs/yml/Island/Game.yml")));
    }

    #[test]
    fn test_dump_interpolates_and_writes_crlf() {
        let config = config();
        let storage = MemoryStorage::with_files([(
            "configs/yml/Island/Game.yml",
            "ServerSettings:\n  ServerAdminPassword: ${ADMIN_PASS}\n  Literal: \\${KEEP}\n",
        )]);
        let env = Environment::from_pairs([("ADMIN_PASS", "hunter2")]);

        let report = Pipeline::new(&config, &storage).dump(&["Island".to_string()], &env);
        assert!(!report.has_failures(), "{:?}", report);

        assert_eq!(
            storage.read(Path::new("configs/ini/Island/Game.ini")).unwrap(),
            b"[ServerSettings]\r\nServerAdminPassword=hunter2\r\nLiteral=${KEEP}\r\n"
        );
    }

    #[test]
    fn test_dump_failure_writes_nothing() {
        let config = config();
        let storage = MemoryStorage::with_files([
            ("configs/yml/Island/Game.yml", "S:\n  P: ${MISSING}\n"),
            ("configs/yml/Ragnarok/Game.yml", "S: !include nowhere.yml\n"),
            ("configs/yml/Fjordur/Game.yml", "S:\n  A: 1\n"),
        ]);

        let report = Pipeline::new(&config, &storage).dump(&servers(), &Environment::new());

        let kinds: Vec<_> = report.failures().map(|(o, e)| (o.server.clone(), e.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                ("Island".to_string(), ErrorKind::UnresolvedVariable { name: "MISSING".into() }),
                ("Ragnarok".to_string(), ErrorKind::IncludeNotFound { path: "nowhere.yml".into() }),
            ]
        );
        assert!(!storage.exists(Path::new("configs/ini/Island/Game.ini")));
        assert!(!storage.exists(Path::new("configs/ini/Ragnarok/Game.ini")));
        assert!(storage.exists(Path::new("configs/ini/Fjordur/Game.ini")));
    }

    #[test]
    fn test_load_keeps_foreign_include_with_same_name() {
        let config = config();
        let storage = MemoryStorage::with_files([
            ("configs/yml/includes/Game.S.yml", "A: other\nB: other\n".as_bytes().to_vec()),
            ("configs/ini/Island/Game.ini", "[S]\nA=1\nB=2\n".as_bytes().to_vec()),
            ("configs/ini/Ragnarok/Game.ini", "[S]\nA=1\nB=2\n".as_bytes().to_vec()),
        ]);

        let report = Pipeline::new(&config, &storage).load(&servers());
        assert!(!report.has_failures(), "{:?}", report);

        assert_eq!(
            storage.read(Path::new("configs/yml/includes/Game.S.yml")).unwrap(),
            b"A: other\nB: other\n"
        );
        let island = String::from_utf8(storage.read(Path::new("configs/yml/Island/Game.yml")).unwrap()).unwrap();
        assert!(island.contains("Game.S-2.yml"), "{}", island);
        assert!(storage.exists(Path::new("configs/yml/includes/Game.S-2.yml")));
    }

    #[test]
    fn test_load_then_dump_keeps_line_ending_and_bom() {
        let config = config();
        let lf = "[ServerSettings]\nMaxPlayers=70\n".as_bytes().to_vec();
        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"[SessionSettings]\r\nSessionName=My Island\r\n");
        let storage = MemoryStorage::with_files([
            ("configs/ini/Island/Game.ini", lf.clone()),
            ("configs/ini/Ragnarok/Game.ini", bom.clone()),
        ]);

        let loaded = Pipeline::new(&config, &storage).load(&servers());
        assert!(!loaded.has_failures(), "{:?}", loaded);
        let island = String::from_utf8(storage.read(Path::new("configs/yml/Island/Game.yml")).unwrap()).unwrap();
        let island = yaml::parse(&island).unwrap();
        let root = island.as_mapping().unwrap();
        assert_eq!(root.keys().next().map(String::as_str), Some(FORMAT_KEY));
        let format = root[FORMAT_KEY].as_mapping().unwrap();
        assert_eq!(format["line_ending"].as_str(), Some("lf"));
        assert_eq!(format["byte_order_mark"].as_bool(), Some(false));

        let rebuilt = MemoryStorage::new();
        for path in storage.paths() {
            if path.starts_with("configs/yml") {
                rebuilt.write(&path, &storage.read(&path).unwrap()).unwrap();
            }
        }
        let dumped = Pipeline::new(&config, &rebuilt).dump(&servers(), &Environment::new());
        assert!(!dumped.has_failures(), "{:?}", dumped);

        assert_eq!(rebuilt.read(Path::new("configs/ini/Island/Game.ini")).unwrap(), lf);
        assert_eq!(rebuilt.read(Path::new("configs/ini/Ragnarok/Game.ini")).unwrap(), bom);
    }

    #[test]
    fn test_load_escapes_placeholders() {
        let config = config();
        let flat = "[SessionSettings]\r\nMotd=cost \\${X} for ${NAME}\r\n;see ${URL}\r\n";
        let storage = MemoryStorage::with_files([("configs/ini/Island/Game.ini", flat)]);
        let pipeline = Pipeline::new(&config, &storage);

        let loaded = pipeline.load(&servers());
        assert!(!loaded.has_failures(), "{:?}", loaded);

        let env = Environment::from_pairs([("NAME", "Island"), ("X", "10")]);
        let dumped = pipeline.dump(&["Island".to_string()], &env);
        assert!(!dumped.has_failures(), "{:?}", dumped);
        assert_eq!(
            storage.read(Path::new("configs/ini/Island/Game.ini")).unwrap(),
            flat.as_bytes()
        );
    }

    #[test]
    fn test_dump_rejects_unknown_format_setting() {
        let config = config();
        let storage = MemoryStorage::with_files([(
            "configs/yml/Island/Game.yml",
            ";format:\n  line_ending: cr\nS:\n  A: 1\n",
        )]);

        let report = Pipeline::new(&config, &storage).dump(&["Island".to_string()], &Environment::new());

        let (_, err) = report.failures().next().unwrap();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.path.as_deref(), Some(";format.line_ending"));
        assert!(!storage.exists(Path::new("configs/ini/Island/Game.ini")));
    }

    #[test]
    fn test_load_reports_unused_includes() {
        let config = config();
        let storage = MemoryStorage::with_files([
            ("configs/ini/Island/Game.ini", "[S]\nA=1\nB=2\n"),
            ("configs/ini/Ragnarok/Game.ini", "[S]\nA=1\nB=2\n"),
        ]);
        let pipeline = Pipeline::new(&config, &storage);

        let first = pipeline.load(&servers());
        assert!(first.unused_includes.is_empty(), "{:?}", first.unused_includes);

        for server in ["Island", "Ragnarok"] {
            let path = format!("configs/ini/{}/Game.ini", server);
            storage.write(Path::new(&path), b"[S]\nA=5\nB=6\n").unwrap();
        }
        let second = pipeline.load(&servers());
        assert!(!second.has_failures(), "{:?}", second);

        let island = String::from_utf8(storage.read(Path::new("configs/yml/Island/Game.yml")).unwrap()).unwrap();
        assert!(island.contains("Game.S-2.yml"), "{}", island);
        assert_eq!(
            second.unused_includes,
            vec![PathBuf::from("configs/yml/includes/Game.S.yml")]
        );
    }
}
