//! End-to-end behavior of the command bridge: a dispatcher over the real
//! application core, driven the way a front end drives it.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pic2acg_core::gate::{Authenticator, ConfirmationReply};
use pic2acg_core::{AppCore, CommandHandler, Dispatcher, HandlerChain, Reply};
use serde_json::json;
use tempfile::TempDir;
use tokio::runtime::Handle;

fn open_core(files: &Path) -> AppCore {
    AppCore::open(files.to_str().expect("utf-8 temp path")).expect("open core")
}

fn dispatcher(core: AppCore) -> Dispatcher {
    Dispatcher::new(Arc::new(core), Handle::current())
}

fn path_params(path: &Path) -> String {
    json!({ "path": path.to_string_lossy() }).to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn saved_proxy_is_read_back_by_its_getter() {
    let temp = TempDir::new().expect("temp dir");
    let d = dispatcher(open_core(&temp.path().join("files")));

    let reply = d
        .invoke("saveProperty", r#"{"name":"proxy","value":"1.2.3.4:8080"}"#)
        .await;
    assert_eq!(reply, Reply::Value(json!({ "success": true })));

    let reply = d.invoke("getProxy", "").await;
    assert_eq!(reply, Reply::value("1.2.3.4:8080"));
}

#[tokio::test(flavor = "multi_thread")]
async fn properties_survive_reopen() {
    let temp = TempDir::new().expect("temp dir");
    let files = temp.path().join("files");

    {
        let d = dispatcher(open_core(&files));
        d.invoke("setImageSwitchAddress", "1").await;
        d.invoke("saveProperty", r#"{"name":"theme","value":"dark"}"#)
            .await;
    }

    let d = dispatcher(open_core(&files));
    assert_eq!(
        d.invoke("getImageSwitchAddress", "").await,
        Reply::value("1")
    );
    assert_eq!(
        d.invoke("loadProperty", r#"{"name":"theme","defaultValue":"light"}"#)
            .await,
        Reply::value("dark")
    );
    assert_eq!(
        d.invoke("loadProperty", r#"{"name":"absent","defaultValue":"light"}"#)
            .await,
        Reply::value("light")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_method_is_unimplemented() {
    let temp = TempDir::new().expect("temp dir");
    let d = dispatcher(open_core(&temp.path().join("files")));

    assert_eq!(d.invoke("androidGetModes", "").await, Reply::Unimplemented);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_command_is_an_error_and_dispatch_continues() {
    let temp = TempDir::new().expect("temp dir");
    let d = dispatcher(open_core(&temp.path().join("files")));

    let reply = d.invoke("saveProperty", "{broken").await;
    assert!(reply.is_error(), "malformed params should fail: {reply:?}");

    let reply = d.invoke("migrate", r#"{"path":"not/absolute"}"#).await;
    assert!(reply.is_error(), "relative target should fail: {reply:?}");

    assert_eq!(d.invoke("preLogin", "").await, Reply::value(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn migration_round_trip_and_idempotence() {
    let temp = TempDir::new().expect("temp dir");
    let files = temp.path().join("files");
    let external = temp.path().join("sdcard/pic2acg");
    let core = open_core(&files);
    let d = dispatcher(core);

    d.invoke("setProxy", "5.6.7.8:1080").await;
    d.invoke("mkdirs", &path_params(&files.join("download/comic-9")))
        .await;
    fs::write(files.join("download/comic-9/001.jpg"), "page").expect("write page");

    // Pre-existing content at the target is destroyed
    fs::create_dir_all(&external).expect("create target");
    fs::write(external.join("sentinel"), "old").expect("write sentinel");

    assert_eq!(d.invoke("migrate", &path_params(&external)).await, Reply::Empty);
    assert!(!external.join("sentinel").exists());
    assert_eq!(
        fs::read_to_string(external.join("download/comic-9/001.jpg")).expect("moved page"),
        "page"
    );
    assert!(!files.join("download").exists());
    assert!(files.join("config.toml").exists(), "config never moves");
    assert_eq!(
        d.invoke("dataLocal", "").await,
        Reply::value(external.to_string_lossy().into_owned())
    );

    // Second run with the same target changes nothing
    assert_eq!(d.invoke("migrate", &path_params(&external)).await, Reply::Empty);
    assert!(external.join("download/comic-9/001.jpg").exists());

    // Back to the default root
    assert_eq!(d.invoke("migrate", r#"{"path":""}"#).await, Reply::Empty);
    assert_eq!(
        d.invoke("dataLocal", "").await,
        Reply::value(files.to_string_lossy().into_owned())
    );
    assert!(!files.join("data.local").exists());
    assert_eq!(d.invoke("getProxy", "").await, Reply::value("5.6.7.8:1080"));

    // A fresh core finds the properties where the pointer says
    drop(d);
    let d = dispatcher(open_core(&files));
    assert_eq!(d.invoke("getProxy", "").await, Reply::value("5.6.7.8:1080"));
}

#[tokio::test(flavor = "multi_thread")]
async fn migrating_into_own_subdirectory_is_rejected() {
    let temp = TempDir::new().expect("temp dir");
    let files = temp.path().join("files");
    let d = dispatcher(open_core(&files));
    d.invoke("setProxy", "keep-me").await;

    let reply = d.invoke("migrate", &path_params(&files.join("inner"))).await;
    assert!(reply.is_error(), "nested target should fail: {reply:?}");
    assert_eq!(d.invoke("getProxy", "").await, Reply::value("keep-me"));
    assert_eq!(
        d.invoke("dataLocal", "").await,
        Reply::value(files.to_string_lossy().into_owned())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn replacing_the_subscriber_closes_the_old_stream() {
    let temp = TempDir::new().expect("temp dir");
    let core = open_core(&temp.path().join("files"));
    let notifier = Arc::clone(core.notifier());

    let mut first = notifier.subscribe();
    assert!(notifier.publish("one"));
    let mut second = notifier.subscribe();
    assert!(notifier.publish("two"));

    assert_eq!(first.next().await.as_deref(), Some("one"));
    assert_eq!(first.next().await, None);
    assert_eq!(second.next().await.as_deref(), Some("two"));

    notifier.unsubscribe();
    assert!(!notifier.publish("three"));
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_authentication_without_prompt_fails_fast() {
    let temp = TempDir::new().expect("temp dir");
    let d = dispatcher(open_core(&temp.path().join("files")));

    let started = Instant::now();
    assert_eq!(
        d.invoke("verifyAuthentication", "").await,
        Reply::value(false)
    );
    assert!(started.elapsed() < Duration::from_secs(1));
}

struct Approving;

impl Authenticator for Approving {
    fn is_available(&self) -> bool {
        true
    }

    fn authenticate(&self, reply: ConfirmationReply) {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            reply.succeeded();
        });
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_authentication_waits_for_the_prompt() {
    let temp = TempDir::new().expect("temp dir");
    let core = open_core(&temp.path().join("files")).with_authenticator(Arc::new(Approving));
    let d = dispatcher(core);

    // Other commands keep flowing while one waits on the prompt
    let (confirmed, proxy) = tokio::join!(
        d.invoke("verifyAuthentication", ""),
        d.invoke("getProxy", "")
    );
    assert_eq!(confirmed, Reply::value(true));
    assert_eq!(proxy, Reply::value(""));
}

struct Platform;

impl CommandHandler for Platform {
    fn handle(&self, method: &str, _params: &str) -> anyhow::Result<Reply> {
        Ok(match method {
            "androidGetModes" => Reply::value("60hz|120hz"),
            _ => Reply::Unimplemented,
        })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn platform_handlers_extend_the_core() {
    let temp = TempDir::new().expect("temp dir");
    let chain = HandlerChain::new()
        .with(Arc::new(open_core(&temp.path().join("files"))))
        .with(Arc::new(Platform));
    let d = Dispatcher::new(Arc::new(chain), Handle::current());

    assert_eq!(
        d.invoke("androidGetModes", "").await,
        Reply::value("60hz|120hz")
    );
    assert_eq!(d.invoke("getPassword", "").await, Reply::value(""));
    assert_eq!(d.invoke("iosOnly", "").await, Reply::Unimplemented);
}
