//! Script handler modules
//!
//! A handler file under the api directory is a program run by the
//! interpreter named on its shebang line (`sh` when there is none). Lines of
//! the form `#require lib/util.sh` (also `//require`, `--require`) pull other
//! files of the api directory in as dependency children.
//!
//! Loading freezes the handler and its transitive dependencies into a private
//! snapshot directory that mirrors the api layout. Invocations run against
//! that snapshot, so a cached module keeps executing the code it was loaded
//! with until the registry drops it.

use super::envelope::{RequestEnvelope, ScriptReply};
use super::registry::{ModuleLoader, ModuleRegistry};
use crate::api::{ApiRequest, ApiResponse, Handler};
use crate::error::{HandlerError, LoadError, ScriptError};
use crate::logger;
use async_trait::async_trait;
use hyper::body::Bytes;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const DEFAULT_INTERPRETER: &str = "sh";
const DIRECTIVE_PREFIXES: [&str; 3] = ["#", "//", "--"];

/// A loaded handler file with its frozen dependency closure
#[derive(Debug)]
pub struct ScriptModule {
    /// Path relative to the api directory
    relative: PathBuf,
    interpreter: Vec<String>,
    /// Own source followed by every transitive dependency, relative paths
    files: Vec<(PathBuf, Bytes)>,
    snapshot: TempDir,
}

impl ScriptModule {
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    pub fn interpreter(&self) -> &[String] {
        &self.interpreter
    }

    pub fn source(&self) -> &Bytes {
        &self.files[0].1
    }

    /// Relative paths of the module and everything it requires
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(path, _)| path.as_path())
    }

    pub fn snapshot_dir(&self) -> &Path {
        self.snapshot.path()
    }

    /// Run the handler process once with `envelope` on stdin
    pub async fn run(&self, envelope: &RequestEnvelope) -> Result<ScriptReply, ScriptError> {
        let payload = serde_json::to_vec(envelope).map_err(ScriptError::Request)?;
        let (program, args) = self
            .interpreter
            .split_first()
            .map_or((DEFAULT_INTERPRETER, &[][..]), |(p, a)| (p.as_str(), a));

        let mut child = Command::new(program)
            .args(args)
            .arg(self.snapshot_dir().join(&self.relative))
            .current_dir(self.snapshot_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScriptError::Spawn {
                interpreter: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // The script may exit without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            logger::log_handler_output(&self.relative, line);
        }

        if !output.status.success() {
            return Err(ScriptError::Exit {
                status: output.status,
            });
        }
        written?;
        ScriptReply::parse(&output.stdout)
    }
}

#[async_trait(?Send)]
impl Handler for ScriptModule {
    async fn call(&self, req: &mut ApiRequest, res: &mut ApiResponse) -> Result<(), HandlerError> {
        let envelope = RequestEnvelope::from_request(req);
        let reply = self.run(&envelope).await?;
        reply.apply(res)
    }
}

/// Loads [`ScriptModule`]s from one api directory
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    api_root: PathBuf,
}

impl ScriptLoader {
    pub fn new(api_dir: &Path) -> Self {
        Self {
            api_root: api_dir
                .canonicalize()
                .unwrap_or_else(|_| api_dir.to_path_buf()),
        }
    }

    pub fn api_root(&self) -> &Path {
        &self.api_root
    }

    fn load_tracked(
        &self,
        id: &Path,
        registry: &ModuleRegistry<ScriptModule>,
        loading: &mut Vec<PathBuf>,
    ) -> Result<(ScriptModule, Vec<PathBuf>), LoadError> {
        let relative = id
            .strip_prefix(&self.api_root)
            .map_err(|_| LoadError::OutsideRoot {
                path: id.to_path_buf(),
                required: id.display().to_string(),
            })?
            .to_path_buf();
        let source = fs::read(id).map_err(|source| LoadError::Read {
            path: id.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&source);
        let interpreter = parse_shebang(&text);

        loading.push(id.to_path_buf());
        let mut files = vec![(relative.clone(), Bytes::from(source.clone()))];
        let mut children = Vec::new();
        for required in parse_requires(&text) {
            let child_id = self.resolve_required(id, required)?;
            children.push(child_id.clone());
            // A dependency cycle back to a module being loaded is already in the closure
            if loading.contains(&child_id) {
                continue;
            }
            let child = if let Some(existing) = registry.get(&child_id) {
                existing
            } else {
                let (module, grandchildren) = self.load_tracked(&child_id, registry, loading)?;
                registry.register(child_id.clone(), module, grandchildren)
            };
            for (path, bytes) in &child.files {
                if !files.iter().any(|(p, _)| p == path) {
                    files.push((path.clone(), bytes.clone()));
                }
            }
        }
        loading.pop();

        let snapshot = materialize(&files).map_err(LoadError::Snapshot)?;
        Ok((
            ScriptModule {
                relative,
                interpreter,
                files,
                snapshot,
            },
            children,
        ))
    }

    /// Canonical id of a `#require` target; it must stay inside the api directory
    fn resolve_required(&self, from: &Path, required: &str) -> Result<PathBuf, LoadError> {
        let outside = || LoadError::OutsideRoot {
            path: from.to_path_buf(),
            required: required.to_string(),
        };
        let relative = Path::new(required);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(outside());
        }
        let id = self
            .api_root
            .join(relative)
            .canonicalize()
            .map_err(|source| LoadError::Resolve {
                specifier: required.to_string(),
                source,
            })?;
        if id.starts_with(&self.api_root) {
            Ok(id)
        } else {
            Err(outside())
        }
    }
}

impl ModuleLoader for ScriptLoader {
    type Module = ScriptModule;

    fn load(
        &self,
        id: &Path,
        registry: &ModuleRegistry<ScriptModule>,
    ) -> Result<(ScriptModule, Vec<PathBuf>), LoadError> {
        self.load_tracked(id, registry, &mut Vec::new())
    }
}

/// Interpreter argv from a `#!` line
fn parse_shebang(source: &str) -> Vec<String> {
    source
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("#!"))
        .map(|rest| rest.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|argv| !argv.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_INTERPRETER.to_string()])
}

/// Targets of `require` directives, in file order
fn parse_requires(source: &str) -> Vec<&str> {
    source
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let rest = DIRECTIVE_PREFIXES
                .iter()
                .find_map(|prefix| line.strip_prefix(prefix))?;
            rest.trim_start().strip_prefix("require ").map(str::trim)
        })
        .filter(|target| !target.is_empty())
        .collect()
}

fn materialize(files: &[(PathBuf, Bytes)]) -> std::io::Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("devserver-").tempdir()?;
    for (relative, bytes) in files {
        let target = dir.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderMap, HeaderValue};
    use hyper::{Method, Uri};

    fn api_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        dir
    }

    fn load(
        loader: &ScriptLoader,
        registry: &ModuleRegistry<ScriptModule>,
        path: &Path,
    ) -> Result<std::sync::Arc<ScriptModule>, LoadError> {
        registry.load_with(&path.to_string_lossy(), loader)
    }

    #[test]
    fn test_parse_shebang() {
        assert_eq!(
            parse_shebang("#!/usr/bin/env python3\nprint()"),
            vec!["/usr/bin/env", "python3"]
        );
        assert_eq!(parse_shebang("echo hi"), vec!["sh"]);
        assert_eq!(parse_shebang("#!\n"), vec!["sh"]);
    }

    #[test]
    fn test_parse_requires() {
        let src = concat!(
            "#!/bin/sh\n#require lib/a.sh\n  // require lib/b.js\n",
            "-- require  c.sql \n# not a directive\n",
        );
        assert_eq!(parse_requires(src), vec!["lib/a.sh", "lib/b.js", "c.sql"]);
    }

    #[test]
    fn test_load_records_dependency_children() {
        let dir = api_dir();
        fs::write(dir.path().join("hello.sh"), "#require lib/util.sh\n. ./lib/util.sh\n").unwrap();
        fs::write(dir.path().join("lib/util.sh"), "#require lib/base.sh\n").unwrap();
        fs::write(dir.path().join("lib/base.sh"), "true\n").unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let module = load(&loader, &registry, &dir.path().join("hello.sh")).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(module.relative_path(), Path::new("hello.sh"));
        assert_eq!(module.interpreter(), ["sh"]);
        let files: Vec<_> = module.files().map(Path::to_path_buf).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("hello.sh"),
                PathBuf::from("lib/util.sh"),
                PathBuf::from("lib/base.sh"),
            ]
        );
        assert!(module.snapshot_dir().join("lib/base.sh").is_file());

        let id = registry.resolve(&dir.path().join("hello.sh").to_string_lossy()).unwrap();
        assert_eq!(registry.purge(&dir.path().join("hello.sh").to_string_lossy()), 3);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_require_cycle_terminates() {
        let dir = api_dir();
        fs::write(dir.path().join("a.sh"), "#require b.sh\n").unwrap();
        fs::write(dir.path().join("b.sh"), "#require a.sh\n").unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let module = load(&loader, &registry, &dir.path().join("a.sh")).unwrap();
        assert_eq!(module.files().count(), 2);
    }

    #[test]
    fn test_require_outside_api_dir_is_rejected() {
        let dir = api_dir();
        fs::write(dir.path().join("evil.sh"), "#require ../secret\n").unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let err = load(&loader, &registry, &dir.path().join("evil.sh")).unwrap_err();
        assert!(matches!(err, LoadError::OutsideRoot { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_frozen_until_purged() {
        let dir = api_dir();
        let file = dir.path().join("v.sh");
        fs::write(&file, "echo one\n").unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let first = load(&loader, &registry, &file).unwrap();
        fs::write(&file, "echo two\n").unwrap();

        let cached = load(&loader, &registry, &file).unwrap();
        assert_eq!(cached.source().as_ref(), b"echo one\n");

        registry.purge(&file.to_string_lossy());
        let fresh = load(&loader, &registry, &file).unwrap();
        assert_eq!(fresh.source().as_ref(), b"echo two\n");
        assert_ne!(first.snapshot_dir(), fresh.snapshot_dir());
    }

    #[tokio::test]
    async fn test_run_script_handler() {
        let dir = api_dir();
        fs::write(dir.path().join("lib/greeting.sh"), "GREETING=hello\n").unwrap();
        fs::write(
            dir.path().join("greet.sh"),
            concat!(
                "#!/bin/sh\n#require lib/greeting.sh\n. ./lib/greeting.sh\ncat > /dev/null\n",
                "echo \"{\\\"status\\\":201,\\\"send\\\":\\\"$GREETING\\\"}\"\n",
            ),
        )
        .unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let module = load(&loader, &registry, &dir.path().join("greet.sh")).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let mut req = ApiRequest::from_parts(
            Method::POST,
            Uri::from_static("/api/greet"),
            headers,
            Bytes::from_static(b"payload"),
        );
        let mut res = ApiResponse::new(false);
        module.call(&mut req, &mut res).await.unwrap();

        assert_eq!(res.status_code(), 201);
        assert_eq!(res.body().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_failing_script_is_handler_error() {
        let dir = api_dir();
        fs::write(dir.path().join("boom.sh"), "echo 'secret detail' >&2\nexit 3\n").unwrap();

        let loader = ScriptLoader::new(dir.path());
        let registry = ModuleRegistry::new();
        let module = load(&loader, &registry, &dir.path().join("boom.sh")).unwrap();

        let mut req = ApiRequest::from_parts(
            Method::GET,
            Uri::from_static("/api/boom"),
            HeaderMap::new(),
            Bytes::new(),
        );
        let mut res = ApiResponse::new(false);
        let err = module.call(&mut req, &mut res).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScriptError>(),
            Some(ScriptError::Exit { .. })
        ));
        assert!(!res.is_finalized());
    }
}
