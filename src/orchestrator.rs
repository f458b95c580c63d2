//! Patch orchestration.
//!
//! [`Patcher`] runs the fixed sequence of patches that switches a React
//! Native project to the V8 runtime. Every step works on one shared
//! [`Changeset`], so steps touching the same file chain in memory and a
//! failing step leaves the project on disk exactly as it was.

use std::fmt;
use std::path::{Path, PathBuf};

use similar::TextDiff;
use walkdir::WalkDir;

use crate::anchor::AnchorStrategy;
use crate::config::{PatchOptions, ProjectPaths, RUNTIME_ARTIFACT_PREFIX};
use crate::edit::{Changeset, FileChange};
use crate::expo::{self, Platform};
use crate::generated::{GeneratedError, MergeResult};
use crate::gradle::Declaration;
use crate::patch::{apply_to_file, PatchError, PatchOutcome, PatchRule};
use crate::safety::ProjectGuard;

/// Commented-out heap setting shipped by the React Native template.
const TEMPLATE_JVM_ARGS_LINE: &str = "# org.gradle.jvmargs=-Xmx2048m -XX:MaxPermSize=512m -XX:+HeapDumpOnOutOfMemoryError -Dfile.encoding=UTF-8";

const LEGACY_RUNTIME_REPOSITORY: &str = "jsc-android/dist";

const HOST_MARKER: &str = "getJavaScriptExecutorFactory";

const HOST_OVERRIDE: &str = r#"
        @Override
        protected com.facebook.react.bridge.JavaScriptExecutorFactory getJavaScriptExecutorFactory() {
          return new io.csie.kudo.reactnative.v8.executor.V8ExecutorFactory(
              getApplicationContext(),
              getPackageName(),
              com.facebook.react.modules.systeminfo.AndroidInfoHelpers.getFriendlyDeviceName(),
              getUseDeveloperSupport());
        }
"#;

const HINT_MARKER: &str = "global._v8runtime";

const HINT_FOOTER: &str = r#"
          {global._v8runtime && (
            <View style={styles.engine}>
              <Text style={styles.footer}>
                Engine: V8 {global._v8runtime().version}
                {console.log(`=== V8 version[${global._v8runtime().version}] ===`)}
              </Text>
            </View>
          )}"#;

const HINT_LOG: &str = r#"
if (global._v8runtime) {
  console.log(`=== V8 version[${global._v8runtime().version}] ===`);
}"#;

/// Directory names never descended into while searching for sources.
const SKIPPED_DIRS: &[&str] = &["build", ".gradle", "node_modules", "Pods"];

/// One stage of a patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    RootRepository,
    AppDependency,
    Packaging,
    JvmHeap,
    RuntimeHost,
    RuntimeHint,
    ExpoAndroid,
    ExpoIos,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::RootRepository => "root-repository",
            Step::AppDependency => "app-dependency",
            Step::Packaging => "packaging",
            Step::JvmHeap => "jvm-heap",
            Step::RuntimeHost => "runtime-host",
            Step::RuntimeHint => "runtime-hint",
            Step::ExpoAndroid => "expo-android",
            Step::ExpoIos => "expo-ios",
        };
        f.write_str(name)
    }
}

/// What one step did to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub file: PathBuf,
    pub outcome: PatchOutcome,
}

/// Unified diff of one staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified: String,
}

/// Plans and commits the V8 integration for one project.
#[derive(Debug)]
pub struct Patcher {
    paths: ProjectPaths,
    options: PatchOptions,
    changeset: Changeset,
    reports: Vec<StepReport>,
}

impl Patcher {
    pub fn new(paths: ProjectPaths, options: PatchOptions) -> Result<Self, PatchError> {
        let guard = ProjectGuard::new(paths.root())?;
        Ok(Self {
            paths,
            options,
            changeset: Changeset::new(guard),
            reports: Vec::new(),
        })
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Stage the Gradle, properties and host-source changes.
    ///
    /// Steps run in a fixed order and the first error aborts the sequence.
    /// Nothing is written until [`Patcher::commit`].
    pub fn add_runtime_support(&mut self) -> Result<(), PatchError> {
        let package = self.options.runtime_package.clone();

        if self.options.root_repository {
            let rule = PatchRule::ReplaceText {
                from: LEGACY_RUNTIME_REPOSITORY.to_string(),
                to: format!("{package}/dist"),
            };
            self.run(Step::RootRepository, &self.paths.root_build_file(), &rule)?;
        }

        let app_build_file = self.paths.app_build_file();
        if self.options.app_dependency {
            let rule = PatchRule::EnsureBlockLine {
                block: "dependencies".to_string(),
                declaration: Declaration::new(
                    RUNTIME_ARTIFACT_PREFIX,
                    format!("implementation \"org.chromium:{package}:+\""),
                ),
            };
            self.run(Step::AppDependency, &app_build_file, &rule)?;
        }

        let rule = PatchRule::EnsureSubBlockLine {
            block: "android".to_string(),
            sub_block: self.options.packaging_block.clone(),
            declaration: Declaration::exclude_library(&self.options.excluded_library),
        };
        self.run(Step::Packaging, &app_build_file, &rule)?;

        if self.options.increase_heap {
            self.increase_jvm_heap()?;
        }

        self.patch_hosts()
    }

    /// Stage the runtime hint in the project's entry script.
    pub fn add_runtime_hint(&mut self) -> Result<(), PatchError> {
        let entry = match self.paths.entry_script() {
            Some(entry) => entry,
            None => {
                let path = self
                    .paths
                    .entry_script_candidates()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.paths.root().to_path_buf());
                return Err(PatchError::MissingFile { path });
            }
        };

        // Each anchor has its own insertion text; both contain the marker.
        let candidates = [
            (
                anchor(
                    "ui-footer",
                    r"(?msR)\{global\.HermesInternal == null \? null.*?\)\}$",
                )?,
                HINT_FOOTER,
            ),
            (
                anchor("module-export", r"(?mR)^export default App;$")?,
                HINT_LOG,
            ),
        ];
        let strategies: Vec<AnchorStrategy> =
            candidates.iter().map(|(strategy, _)| strategy.clone()).collect();

        let content = self.read(&entry)?;
        let chosen = crate::anchor::first_match(&strategies, &content)
            .map(|found| found.strategy.to_string());
        let (anchors, text) = match candidates
            .iter()
            .find(|(strategy, _)| chosen.as_deref() == Some(strategy.name()))
        {
            Some((strategy, text)) => (vec![strategy.clone()], text.to_string()),
            None => (strategies, String::new()),
        };

        let rule = PatchRule::InsertAfterAnchor {
            anchors,
            text,
            marker: HINT_MARKER.to_string(),
            required: true,
        };
        self.run(Step::RuntimeHint, &entry, &rule)
    }

    /// Stage the Expo prebuild sections.
    ///
    /// Each platform is only patched when the app config selects the JSC
    /// engine for it.
    pub fn add_expo_adapter(&mut self, android: bool, ios: bool) -> Result<(), PatchError> {
        if android {
            self.require_engine(Platform::Android)?;
            let file = self.paths.app_build_file();
            if file.extension().is_some_and(|ext| ext == "kts") {
                return Err(PatchError::UnsupportedLayout {
                    file,
                    reason: "Kotlin build scripts are not supported".to_string(),
                });
            }
            self.merge_generated(Step::ExpoAndroid, &file, expo::update_android_app_gradle)?;
        }

        if ios {
            self.require_engine(Platform::Ios)?;
            let root = self.paths.ios_search_root();
            let name = self.paths.layout().app_delegate_name.clone();
            let delegates = self.find_sources(&root, std::slice::from_ref(&name))?;
            if delegates.is_empty() {
                return Err(PatchError::MissingFile {
                    path: root.join(name),
                });
            }
            for delegate in delegates {
                self.merge_generated(Step::ExpoIos, &delegate, expo::update_ios_app_delegate)?;
            }
        }

        Ok(())
    }

    /// Step outcomes in execution order.
    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    /// Files whose staged content differs from disk.
    pub fn changes(&self) -> impl Iterator<Item = FileChange<'_>> {
        self.changeset.changes()
    }

    pub fn diffs(&self) -> Vec<FileDiff> {
        self.changes()
            .map(|change| {
                let name = self.display_path(change.path);
                let unified = TextDiff::from_lines(change.before, change.after)
                    .unified_diff()
                    .context_radius(3)
                    .header(&format!("a/{name}"), &format!("b/{name}"))
                    .to_string();
                FileDiff {
                    path: change.path.to_path_buf(),
                    unified,
                }
            })
            .collect()
    }

    /// Write every staged change. Returns the files written.
    pub fn commit(self) -> Result<Vec<PathBuf>, PatchError> {
        Ok(self.changeset.commit()?)
    }

    fn run(&mut self, step: Step, file: &Path, rule: &PatchRule) -> Result<(), PatchError> {
        let (file, outcome) = apply_to_file(&mut self.changeset, file, rule)?;
        self.record(step, file, outcome);
        Ok(())
    }

    fn record(&mut self, step: Step, file: PathBuf, outcome: PatchOutcome) {
        tracing::info!(
            step = %step,
            file = %self.display_path(&file),
            outcome = %outcome,
            "patch step finished"
        );
        self.reports.push(StepReport {
            step,
            file,
            outcome,
        });
    }

    fn read(&mut self, file: &Path) -> Result<String, PatchError> {
        let (_, content) = self.changeset.read(file)?;
        Ok(content)
    }

    fn require_engine(&mut self, platform: Platform) -> Result<(), PatchError> {
        let file = self.paths.app_config();
        if !file.is_file() {
            return Err(PatchError::MissingFile { path: file });
        }

        let content = self.read(&file)?;
        let engine = expo::js_engine(&content, platform).map_err(|source| {
            PatchError::InvalidAppConfig {
                file: file.clone(),
                source,
            }
        })?;
        tracing::debug!(%platform, engine = ?engine, "expo engine resolved");

        match engine {
            Some(engine) if engine == expo::REQUIRED_ENGINE => Ok(()),
            other => Err(PatchError::UnsupportedEngine {
                file,
                platform: platform.to_string(),
                engine: other.map_or_else(|| "unset".to_string(), |engine| format!("'{engine}'")),
            }),
        }
    }

    fn increase_jvm_heap(&mut self) -> Result<(), PatchError> {
        let properties = self.paths.build_properties();
        if !properties.is_file() {
            self.record(
                Step::JvmHeap,
                properties,
                PatchOutcome::NotApplicable {
                    reason: "no gradle.properties".to_string(),
                },
            );
            return Ok(());
        }

        let rule = PatchRule::ReplaceLine {
            from: TEMPLATE_JVM_ARGS_LINE.to_string(),
            to: format!("org.gradle.jvmargs={}", self.options.jvm_args),
        };
        self.run(Step::JvmHeap, &properties, &rule)
    }

    fn patch_hosts(&mut self) -> Result<(), PatchError> {
        let root = self.paths.host_search_root();
        let names = self.paths.layout().host_file_names.clone();
        let hosts = self.find_sources(&root, &names)?;

        if hosts.is_empty() {
            if self.options.strict_hosts {
                return Err(PatchError::NoHostFiles {
                    root,
                    names: names.join(", "),
                });
            }
            tracing::warn!(
                root = %root.display(),
                names = %names.join(", "),
                "no application host found, executor factory not installed"
            );
            self.record(
                Step::RuntimeHost,
                root,
                PatchOutcome::NotApplicable {
                    reason: format!("no {} found", names.join(", ")),
                },
            );
            return Ok(());
        }

        let rule = PatchRule::InsertAfterAnchor {
            anchors: vec![
                anchor(
                    "module-name-method",
                    r"protected String getJSMainModuleName\(\) \{\r?\n[^\n]*\n[^\n]*\}\r?\n",
                )?,
                anchor(
                    "developer-support-method",
                    r"public boolean getUseDeveloperSupport\(\) \{\r?\n[^\n]*\n[^\n]*\}\r?\n",
                )?,
            ],
            text: HOST_OVERRIDE.to_string(),
            marker: HOST_MARKER.to_string(),
            required: false,
        };
        for host in hosts {
            self.run(Step::RuntimeHost, &host, &rule)?;
        }
        Ok(())
    }

    /// Files under `root` whose name is one of `names`, sorted. Build output
    /// and vendored directories are skipped.
    fn find_sources(&self, root: &Path, names: &[String]) -> Result<Vec<PathBuf>, PatchError> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let guard = self.changeset.guard();
        let root = guard.validate_path(root)?;
        let mut found = Vec::new();
        let walker = WalkDir::new(&root).follow_links(false).into_iter();
        for entry in walker.filter_entry(|entry| {
            let skipped = entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            !skipped && !guard.is_forbidden(entry.path())
        }) {
            let entry = entry.map_err(|source| PatchError::Walk {
                root: root.clone(),
                source,
            })?;
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| names.iter().any(|wanted| wanted == name));
            if entry.file_type().is_file() && matches {
                found.push(entry.into_path());
            }
        }

        found.sort();
        tracing::debug!(root = %root.display(), count = found.len(), "source search finished");
        Ok(found)
    }

    fn merge_generated(
        &mut self,
        step: Step,
        file: &Path,
        merge: fn(&str) -> Result<MergeResult, GeneratedError>,
    ) -> Result<(), PatchError> {
        if !file.exists() {
            return Err(PatchError::MissingFile {
                path: file.to_path_buf(),
            });
        }

        let (canonical, content) = self.changeset.read(file)?;
        let merged = merge(&content).map_err(|error| match error {
            GeneratedError::AnchorNotFound { anchor } => PatchError::AnchorNotFound {
                file: canonical.clone(),
                tried: anchor,
            },
            GeneratedError::InvalidAnchor { pattern, source } => PatchError::InvalidAnchor {
                name: pattern,
                source,
            },
        })?;

        let outcome = if merged.did_merge {
            let strategy = if merged.did_clear {
                "generated-section-replaced"
            } else {
                "generated-section"
            };
            self.changeset.stage(&canonical, merged.contents);
            PatchOutcome::Applied {
                strategy: strategy.to_string(),
            }
        } else {
            PatchOutcome::AlreadyApplied
        };
        self.record(step, canonical, outcome);
        Ok(())
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(self.changeset.guard().project_root())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn anchor(name: &str, pattern: &str) -> Result<AnchorStrategy, PatchError> {
    AnchorStrategy::new(name, pattern).map_err(|source| PatchError::InvalidAnchor {
        name: name.to_string(),
        source,
    })
}
