use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::{
    fs::{DirBuilder, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

use crate::{
    plugin::{LoadOptions, PluginConfigLoader, PluginStatusProbe},
    runtime::{UpdateRuntimeConfigRequest, UpdateRuntimeConfigResponse},
    template::{ConfigTemplate, RenderContext, TemplateRenderer},
};

use self::{context::ReconcilerConfig, error::ReconcilerError};

pub mod context;
pub mod error;

const CONFIG_DIRECTORY_MODE: u32 = 0o755;
const CONFIG_FILE_MODE: u32 = 0o644;

/// What a reconciliation ended up doing. Everything except `Generated` is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    NoPodCidr,
    NoTemplate,
    PluginReady,
    ConfigLoaded,
    Generated { path: PathBuf },
}

/// Writes the CNI config from a template once the node gets a pod CIDR,
/// unless the network plugin is already usable.
pub struct ConfigReconciler<S, L, R> {
    config: ReconcilerConfig,
    status_probe: S,
    config_loader: L,
    renderer: R,
    // guards the readiness checks and the write to the config directory
    generation_lock: Mutex<()>,
}

impl<S, L, R> ConfigReconciler<S, L, R>
where
    S: PluginStatusProbe,
    L: PluginConfigLoader,
    R: TemplateRenderer,
{
    pub fn new(config: ReconcilerConfig, status_probe: S, config_loader: L, renderer: R) -> Self {
        Self {
            config,
            status_probe,
            config_loader,
            renderer,
            generation_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub async fn update_runtime_config(
        &self,
        request: &UpdateRuntimeConfigRequest,
    ) -> Result<UpdateRuntimeConfigResponse, ReconcilerError> {
        self.reconcile(request.pod_cidr()).await?;

        Ok(UpdateRuntimeConfigResponse::default())
    }

    pub async fn reconcile(&self, pod_cidr: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        if pod_cidr.is_empty() {
            debug!("No pod CIDR assigned, nothing to reconcile");
            return Ok(ReconcileOutcome::NoPodCidr);
        }

        let template_path = match self.config.template_path() {
            Some(path) => path,
            None => {
                info!("No CNI config template is specified, waiting for other system components to drop the config.");
                return Ok(ReconcileOutcome::NoTemplate);
            }
        };

        let _guard = self.generation_lock.lock().await;

        match self.status_probe.status() {
            Ok(_) => {
                info!("Network plugin is ready, skipping CNI config generation from template {template_path:?}");
                return Ok(ReconcileOutcome::PluginReady);
            }
            Err(err) => debug!("Network plugin is not ready: {err}"),
        }

        match self.config_loader.load(LoadOptions::standard()) {
            Ok(_) => {
                info!("CNI config is successfully loaded, skipping CNI config generation from template {template_path:?}");
                return Ok(ReconcileOutcome::ConfigLoaded);
            }
            Err(err) => debug!("Couldn't load existing CNI config: {err}"),
        }

        info!("Generating CNI config for pod CIDR {pod_cidr} from template {template_path:?}...");

        let path = self.generate(template_path, pod_cidr).await?;

        info!("CNI config written to {path:?}!");

        Ok(ReconcileOutcome::Generated { path })
    }

    async fn generate(
        &self,
        template_path: &Path,
        pod_cidr: &str,
    ) -> Result<PathBuf, ReconcilerError> {
        let template = self.renderer.parse(template_path).map_err(|source| {
            ReconcilerError::TemplateParse {
                path: template_path.to_owned(),
                source,
            }
        })?;

        let config_file = self.config.config_file_path();
        let mut rendered = Vec::new();
        template
            .execute(&mut rendered, &RenderContext::new(pod_cidr))
            .map_err(|source| ReconcilerError::Render {
                path: config_file.clone(),
                source,
            })?;

        let directory = self.config.config_directory();
        DirBuilder::new()
            .recursive(true)
            .mode(CONFIG_DIRECTORY_MODE)
            .create(directory)
            .await
            .map_err(|source| ReconcilerError::Directory {
                path: directory.to_owned(),
                source,
            })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CONFIG_FILE_MODE)
            .open(&config_file)
            .await
            .map_err(|source| ReconcilerError::FileOpen {
                path: config_file.clone(),
                source,
            })?;

        let written = match file.write_all(&rendered).await {
            Ok(_) => file.flush().await,
            Err(err) => Err(err),
        };
        written.map_err(|source| ReconcilerError::Write {
            path: config_file.clone(),
            source,
        })?;

        Ok(config_file)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        os::unix::fs::PermissionsExt,
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use tempfile::{tempdir, TempDir};

    use crate::{
        plugin::{
            cni::CniPlugin, LoadOptions, PluginConfigLoader, PluginError, PluginStatusProbe,
        },
        reconciler::error::ReconcilerErrorKind,
        runtime::UpdateRuntimeConfigRequest,
        template::field::FieldTemplateRenderer,
        CNI_CONFIG_FILE_NAME,
    };

    use super::{context::ReconcilerConfigBuilder, ConfigReconciler, ReconcileOutcome};

    const POD_CIDR: &str = "10.244.1.0/24";
    const TEMPLATE: &str = r#"{
  "cniVersion": "0.3.1",
  "name": "containerd-net",
  "plugins": [
    {
      "type": "bridge",
      "ipam": { "type": "host-local", "ranges": [[{ "subnet": "{{.PodCIDR}}" }]] }
    }
  ]
}"#;

    struct FakeStatusProbe {
        ready: bool,
        calls: AtomicUsize,
    }

    impl FakeStatusProbe {
        fn new(ready: bool) -> Self {
            Self {
                ready,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PluginStatusProbe for FakeStatusProbe {
        fn status(&self) -> Result<(), PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.ready {
                true => Ok(()),
                false => Err(PluginError::NotInitialized {
                    loaded: 0,
                    required: 2,
                }),
            }
        }
    }

    struct FakeConfigLoader {
        loads: bool,
        calls: AtomicUsize,
    }

    impl FakeConfigLoader {
        fn new(loads: bool) -> Self {
            Self {
                loads,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PluginConfigLoader for FakeConfigLoader {
        fn load(&self, options: LoadOptions) -> Result<(), PluginError> {
            assert_eq!(options, LoadOptions::standard());
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.loads {
                true => Ok(()),
                false => Err(PluginError::NoConfigFound("/etc/cni/net.d".into())),
            }
        }
    }

    type FakeReconciler = ConfigReconciler<FakeStatusProbe, FakeConfigLoader, FieldTemplateRenderer>;

    struct Fixture {
        dir: TempDir,
        reconciler: FakeReconciler,
    }

    impl Fixture {
        fn config_directory(&self) -> std::path::PathBuf {
            self.dir.path().join("etc").join("cni").join("net.d")
        }

        fn config_file(&self) -> std::path::PathBuf {
            self.config_directory().join(CNI_CONFIG_FILE_NAME)
        }
    }

    fn fixture(template: Option<&str>, ready: bool, loads: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let template_path = template.map(|content| {
            let path = dir.path().join("cni.template");
            fs::write(&path, content).unwrap();
            path
        });
        let config = ReconcilerConfigBuilder::default()
            .template_path(template_path)
            .config_directory(dir.path().join("etc").join("cni").join("net.d"))
            .build()
            .unwrap();

        Fixture {
            reconciler: ConfigReconciler::new(
                config,
                FakeStatusProbe::new(ready),
                FakeConfigLoader::new(loads),
                FieldTemplateRenderer::new(),
            ),
            dir,
        }
    }

    fn probe_calls(fixture: &Fixture) -> (usize, usize) {
        (
            fixture.reconciler.status_probe.calls.load(Ordering::SeqCst),
            fixture.reconciler.config_loader.calls.load(Ordering::SeqCst),
        )
    }

    #[tokio::test]
    async fn empty_pod_cidr_has_no_side_effects() {
        let fixture = fixture(Some(TEMPLATE), false, false);

        let outcome = fixture.reconciler.reconcile("").await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::NoPodCidr);
        assert_eq!(probe_calls(&fixture), (0, 0));
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn missing_template_defers_to_other_components() {
        let fixture = fixture(None, false, false);

        let outcome = fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::NoTemplate);
        assert_eq!(probe_calls(&fixture), (0, 0));
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn ready_plugin_is_left_alone() {
        let fixture = fixture(Some(TEMPLATE), true, false);

        let outcome = fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::PluginReady);
        assert_eq!(probe_calls(&fixture), (1, 0));
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn loadable_config_takes_precedence_over_template() {
        let fixture = fixture(Some(TEMPLATE), false, true);

        let outcome = fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::ConfigLoaded);
        assert_eq!(probe_calls(&fixture), (1, 1));
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn generates_config_with_pod_cidr_substituted_once() {
        let fixture = fixture(Some(TEMPLATE), false, false);

        let outcome = fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Generated {
                path: fixture.config_file()
            }
        );
        let content = fs::read_to_string(fixture.config_file()).unwrap();
        assert_eq!(content.matches(POD_CIDR).count(), 1);
        assert_eq!(content, TEMPLATE.replace("{{.PodCIDR}}", POD_CIDR));
        assert_eq!(fs::read_dir(fixture.config_directory()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn update_runtime_config_reads_pod_cidr_from_request() {
        let fixture = fixture(Some(TEMPLATE), false, false);

        fixture
            .reconciler
            .update_runtime_config(&UpdateRuntimeConfigRequest::with_pod_cidr(POD_CIDR))
            .await
            .unwrap();
        fixture
            .reconciler
            .update_runtime_config(&UpdateRuntimeConfigRequest::default())
            .await
            .unwrap();

        assert!(fs::read_to_string(fixture.config_file())
            .unwrap()
            .contains(POD_CIDR));
        assert_eq!(probe_calls(&fixture), (1, 1));
    }

    #[tokio::test]
    async fn shorter_output_truncates_previous_config() {
        let fixture = fixture(Some("{{.PodCIDR}}"), false, false);
        fs::create_dir_all(fixture.config_directory()).unwrap();
        fs::write(fixture.config_file(), "x".repeat(256)).unwrap();

        fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        assert_eq!(fs::read_to_string(fixture.config_file()).unwrap(), POD_CIDR);
    }

    #[tokio::test]
    async fn malformed_template_leaves_directory_untouched() {
        let fixture = fixture(Some("{\"subnet\": \"{{.PodCIDR\"}"), false, false);

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::TemplateParse);
        assert_eq!(error.path(), &fixture.dir.path().join("cni.template"));
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn missing_template_file_is_a_parse_error() {
        let fixture = fixture(Some(TEMPLATE), false, false);
        fs::remove_file(fixture.dir.path().join("cni.template")).unwrap();

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::TemplateParse);
        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn unknown_template_field_is_a_render_error() {
        let fixture = fixture(Some("{{.ServiceCIDR}}"), false, false);

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::Render);
        assert_eq!(error.path(), &fixture.config_file());
    }

    #[tokio::test]
    async fn render_error_keeps_previous_config() {
        let fixture = fixture(Some(r#""dns": "{{.ClusterDNS}}""#), false, false);
        fs::create_dir_all(fixture.config_directory()).unwrap();
        fs::write(fixture.config_file(), "previous").unwrap();

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::Render);
        assert_eq!(fs::read_to_string(fixture.config_file()).unwrap(), "previous");
    }

    #[tokio::test]
    async fn render_error_creates_nothing() {
        let fixture = fixture(Some("{{.ServiceCIDR}}"), false, false);

        fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert!(!fixture.config_directory().exists());
    }

    #[tokio::test]
    async fn generated_config_is_world_readable_and_owner_writable_only() {
        let fixture = fixture(Some(TEMPLATE), false, false);

        fixture.reconciler.reconcile(POD_CIDR).await.unwrap();

        // umask can only take bits away from 0755 and 0644
        let directory_mode = fs::metadata(fixture.config_directory())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        let file_mode = fs::metadata(fixture.config_file())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;

        assert_eq!(directory_mode & !0o755, 0, "directory mode {directory_mode:o}");
        assert_eq!(directory_mode & 0o700, 0o700, "directory mode {directory_mode:o}");
        assert_eq!(file_mode & !0o644, 0, "file mode {file_mode:o}");
        assert_eq!(file_mode & 0o600, 0o600, "file mode {file_mode:o}");
    }

    #[tokio::test]
    async fn directory_blocked_by_file_is_a_directory_error() {
        let fixture = fixture(Some(TEMPLATE), false, false);
        fs::create_dir_all(fixture.dir.path().join("etc").join("cni")).unwrap();
        fs::write(fixture.config_directory(), "not a directory").unwrap();

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::Directory);
        assert_eq!(error.path(), &fixture.config_directory());
    }

    #[tokio::test]
    async fn config_path_taken_by_directory_is_a_file_open_error() {
        let fixture = fixture(Some(TEMPLATE), false, false);
        fs::create_dir_all(fixture.config_file()).unwrap();

        let error = fixture.reconciler.reconcile(POD_CIDR).await.unwrap_err();

        assert_eq!(error.kind(), ReconcilerErrorKind::FileOpen);
        assert_eq!(error.path(), &fixture.config_file());
    }

    #[tokio::test]
    async fn concurrent_reconciliations_write_a_consistent_file() {
        let fixture = fixture(Some(TEMPLATE), false, false);

        let (first, second) = tokio::join!(
            fixture.reconciler.reconcile(POD_CIDR),
            fixture.reconciler.reconcile(POD_CIDR)
        );

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(
            fs::read_to_string(fixture.config_file()).unwrap(),
            TEMPLATE.replace("{{.PodCIDR}}", POD_CIDR)
        );
    }

    #[tokio::test]
    async fn generated_config_is_picked_up_by_cni_plugin() {
        let dir = tempdir().unwrap();
        let template_path = dir.path().join("cni.template");
        fs::write(&template_path, TEMPLATE).unwrap();
        let config_directory = dir.path().join("net.d");
        let plugin = Arc::new(CniPlugin::new(&config_directory));
        let reconciler = ConfigReconciler::new(
            ReconcilerConfigBuilder::default()
                .template_path(Some(template_path))
                .config_directory(config_directory.clone())
                .build()
                .unwrap(),
            plugin.clone(),
            plugin.clone(),
            FieldTemplateRenderer::new(),
        );

        let first = reconciler.reconcile(POD_CIDR).await.unwrap();
        let second = reconciler.reconcile(POD_CIDR).await.unwrap();
        let third = reconciler.reconcile(POD_CIDR).await.unwrap();

        assert!(matches!(first, ReconcileOutcome::Generated { path } if path.parent() == Some(Path::new(&config_directory))));
        assert_eq!(second, ReconcileOutcome::ConfigLoaded);
        assert_eq!(third, ReconcileOutcome::PluginReady);
        assert_eq!(plugin.networks().unwrap()[1].name, "containerd-net");
    }
}
