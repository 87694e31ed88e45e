//! End-to-end tests: certificate on disk → reconcile → mock admin API
//!
//! acme.sh is replaced by small shell scripts whose exit status is fixed,
//! so the whole run can be exercised without a CA.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rcgen::{date_time_ymd, CertificateParams, KeyPair};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certsync::{
    AcmeError, AcmeInstaller, Orchestrator, ReconcileAction, ReconcileError, RunOutcome,
    SyncError,
};
use certsync_common::SYNTHESIZED_ID_PREFIX;
use certsync_config::{AcmeSettings, ConfigOverrides, RenewConfig};

const DOMAIN: &str = "*.example.com";
const TOKEN: &str = "edd1c9f034335f136f87ad84b625c8f1";

/// 2030-01-01T00:00:00Z
const NOT_BEFORE: i64 = 1893456000;
/// 2099-01-01T00:00:00Z
const NOT_AFTER: i64 = 4070908800;

struct Fixture {
    dir: TempDir,
    server: MockServer,
}

impl Fixture {
    async fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
            server: MockServer::start().await,
        };
        fixture.write_certificate(&[DOMAIN, "example.com"]);
        fixture
    }

    fn write_certificate(&self, names: &[&str]) {
        let mut params =
            CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .unwrap();
        params.not_before = date_time_ymd(2030, 1, 1);
        params.not_after = date_time_ymd(2099, 1, 1);

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        std::fs::write(self.dir.path().join(format!("{}.cer", DOMAIN)), cert.pem()).unwrap();
        std::fs::write(
            self.dir.path().join(format!("{}.key", DOMAIN)),
            key.serialize_pem(),
        )
        .unwrap();
    }

    /// A stand-in acme.sh that reports a version and exits with `issue_status`
    fn fake_acme(&self, issue_status: i32) -> PathBuf {
        let script = self.dir.path().join("acme.sh");
        let args_log = self.dir.path().join("acme-args.log");
        let body = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"-v\" ]; then\n\
             echo 'https://github.com/acmesh-official/acme.sh'\n\
             echo 'v3.0.7'\n\
             exit 0\n\
             fi\n\
             echo \"$@\" > '{}'\n\
             exit {}\n",
            args_log.display(),
            issue_status
        );
        write_executable(&script, &body);
        script
    }

    fn acme_args(&self) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join("acme-args.log")).ok()
    }

    fn config(&self, acme_script: PathBuf, force: bool) -> RenewConfig {
        RenewConfig::default().apply(ConfigOverrides {
            domain: Some(DOMAIN.to_string()),
            cert_path: Some(self.dir.path().to_path_buf()),
            acme_script: Some(acme_script),
            host: Some(self.server.uri()),
            token: Some(TOKEN.to_string()),
            timeout_secs: Some(5),
            force,
            ..Default::default()
        })
    }

    async fn mount_listing(&self, entries: Value) {
        Mock::given(method("GET"))
            .and(path("/apisix/admin/ssls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": entries.as_array().map(|a| a.len()).unwrap_or(0),
                "list": entries
            })))
            .mount(&self.server)
            .await;
    }

    async fn put_bodies(&self) -> Vec<(String, Value)> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| {
                let body = serde_json::from_slice(&r.body).unwrap();
                (r.url.path().to_string(), body)
            })
            .collect()
    }
}

fn write_executable(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

fn entry(id: &str, snis: &[&str]) -> Value {
    json!({
        "key": format!("/apisix/ssls/{}", id),
        "value": {"id": id, "snis": snis, "cert": "OLD", "key": "OLD"}
    })
}

// ============================================================================
// sync: certificate already on disk
// ============================================================================

#[tokio::test]
async fn test_sync_updates_matching_entry() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([
        entry("1", &["api.example.org"]),
        entry("42211", &[DOMAIN]),
    ]))
    .await;

    Mock::given(method("PUT"))
        .and(path("/apisix/admin/ssls/42211"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), false);
    let outcome = Orchestrator::new(&config).unwrap().sync().await.unwrap();

    assert_eq!(outcome.id.as_str(), "42211");
    assert_eq!(outcome.action, ReconcileAction::Updated);

    let puts = fx.put_bodies().await;
    assert_eq!(puts.len(), 1);
    let (_, body) = &puts[0];
    assert_eq!(body["snis"], json!([DOMAIN]));
    assert!(body["cert"].as_str().unwrap().starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(body["key"].as_str().unwrap().contains("PRIVATE KEY"));
    assert_eq!(body["validity_start"], json!(NOT_BEFORE));
    assert_eq!(body["validity_end"], json!(NOT_AFTER));
}

#[tokio::test]
async fn test_sync_first_match_wins() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([
        entry("first", &[DOMAIN]),
        entry("second", &[DOMAIN]),
    ]))
    .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/apisix/admin/ssls/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), false);
    let outcome = Orchestrator::new(&config).unwrap().sync().await.unwrap();

    assert_eq!(outcome.id.as_str(), "first");
    let puts = fx.put_bodies().await;
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, "/apisix/admin/ssls/first");
}

#[tokio::test]
async fn test_sync_ignores_domain_in_secondary_position() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([entry("9", &["example.com", DOMAIN])]))
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), false);
    let err = Orchestrator::new(&config).unwrap().sync().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Reconcile(ReconcileError::NoExistingRecord { .. })
    ));
}

#[tokio::test]
async fn test_sync_without_match_fails_without_writing() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([])).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), false);
    let err = Orchestrator::new(&config).unwrap().sync().await.unwrap_err();

    match err {
        SyncError::Reconcile(ReconcileError::NoExistingRecord { domain }) => {
            assert_eq!(domain, DOMAIN);
        }
        other => panic!("expected NoExistingRecord, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sync_force_creates_entry() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([entry("1", &["api.example.org"])]))
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/apisix/admin/ssls/199200\d+$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), true);
    let outcome = Orchestrator::new(&config).unwrap().sync().await.unwrap();

    assert_eq!(outcome.action, ReconcileAction::Created);
    assert!(outcome.id.as_str().starts_with(SYNTHESIZED_ID_PREFIX));

    let puts = fx.put_bodies().await;
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, format!("/apisix/admin/ssls/{}", outcome.id));
    assert_eq!(puts[0].1["snis"], json!([DOMAIN]));
}

#[tokio::test]
async fn test_sync_auth_failure_stops_before_write() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fx.server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), true);
    let err = Orchestrator::new(&config).unwrap().sync().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Reconcile(ReconcileError::Registry(
            certsync::RegistryError::AuthFailed { .. }
        ))
    ));
}

#[tokio::test]
async fn test_sync_missing_certificate() {
    let fx = Fixture::new().await;
    std::fs::remove_file(fx.dir.path().join(format!("{}.cer", DOMAIN))).unwrap();

    let config = fx.config(fx.fake_acme(0), false);
    let err = Orchestrator::new(&config).unwrap().sync().await.unwrap_err();

    assert!(matches!(err, SyncError::CertificateFiles(_)));
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_check_loads_bundle_without_registry_calls() {
    let fx = Fixture::new().await;

    let config = fx.config(fx.fake_acme(0), false);
    let bundle = Orchestrator::new(&config).unwrap().check().await.unwrap();

    assert_eq!(bundle.subject_names, vec![DOMAIN, "example.com"]);
    assert_eq!(bundle.validity_end, NOT_AFTER);
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// renew: acme.sh then sync
// ============================================================================

#[tokio::test]
async fn test_renew_issues_then_publishes() {
    let fx = Fixture::new().await;
    fx.mount_listing(json!([entry("42211", &[DOMAIN])])).await;

    Mock::given(method("PUT"))
        .and(path("/apisix/admin/ssls/42211"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&fx.server)
        .await;

    let config = fx.config(fx.fake_acme(0), false);
    let outcome = Orchestrator::new(&config).unwrap().renew().await.unwrap();

    match outcome {
        RunOutcome::Synced(outcome) => assert_eq!(outcome.id.as_str(), "42211"),
        other => panic!("expected Synced, got {:?}", other),
    }

    let args = fx.acme_args().unwrap();
    assert!(args.starts_with("--issue -d *.example.com --dns dns_cf -w "));
    assert!(!args.contains("--force"));
}

#[tokio::test]
async fn test_renew_not_due_leaves_registry_untouched() {
    let fx = Fixture::new().await;

    let config = fx.config(fx.fake_acme(2), false);
    let outcome = Orchestrator::new(&config).unwrap().renew().await.unwrap();

    assert_eq!(outcome, RunOutcome::NotDue);
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_renew_acme_failure_leaves_registry_untouched() {
    let fx = Fixture::new().await;

    let config = fx.config(fx.fake_acme(1), true);
    let err = Orchestrator::new(&config).unwrap().renew().await.unwrap_err();

    match err {
        SyncError::Acme(AcmeError::RenewalFailed { domain, .. }) => assert_eq!(domain, DOMAIN),
        other => panic!("expected RenewalFailed, got {:?}", other),
    }
    assert!(fx.acme_args().unwrap().contains("--force"));
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// acme.sh installation
// ============================================================================

#[tokio::test]
async fn test_installer_downloads_and_runs_script() {
    let fx = Fixture::new().await;
    let home = fx.dir.path().join("home");
    let script = home.join(".acme.sh").join("acme.sh");

    let installer_body = format!(
        "#!/bin/sh\n\
         mkdir -p '{dir}'\n\
         printf '#!/bin/sh\\necho v3.0.7\\n' > '{script}'\n\
         chmod 755 '{script}'\n",
        dir = home.join(".acme.sh").display(),
        script = script.display()
    );

    Mock::given(method("GET"))
        .and(path("/install.sh"))
        .respond_with(ResponseTemplate::new(200).set_body_string(installer_body))
        .expect(1)
        .mount(&fx.server)
        .await;

    let installer = AcmeInstaller::new(&AcmeSettings {
        script: script.clone(),
        install_url: format!("{}/install.sh", fx.server.uri()),
        ..Default::default()
    })
    .unwrap();

    assert!(installer.installed_version().await.is_none());
    let version = installer.ensure_installed().await.unwrap();

    assert_eq!(version, "3.0.7");
    assert!(script.exists());
}

#[tokio::test]
async fn test_installer_skips_download_when_present() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let installer = AcmeInstaller::new(&AcmeSettings {
        script: fx.fake_acme(0),
        install_url: format!("{}/install.sh", fx.server.uri()),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(installer.ensure_installed().await.unwrap(), "3.0.7");
}

#[tokio::test]
async fn test_installer_download_failure() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fx.server)
        .await;

    let installer = AcmeInstaller::new(&AcmeSettings {
        script: fx.dir.path().join("missing").join("acme.sh"),
        install_url: format!("{}/install.sh", fx.server.uri()),
        ..Default::default()
    })
    .unwrap();

    let err = installer.ensure_installed().await.unwrap_err();
    assert!(matches!(err, AcmeError::Install(_)));
}

#[tokio::test]
async fn test_installer_download_times_out() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&fx.server)
        .await;

    let installer = AcmeInstaller::new(&AcmeSettings {
        script: fx.dir.path().join("missing").join("acme.sh"),
        install_url: format!("{}/install.sh", fx.server.uri()),
        download_timeout_secs: 1,
        ..Default::default()
    })
    .unwrap();

    let started = std::time::Instant::now();
    let err = installer.install().await.unwrap_err();

    match err {
        AcmeError::Install(message) => assert!(message.contains("timed out"), "{message}"),
        other => panic!("expected Install, got {:?}", other),
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}
