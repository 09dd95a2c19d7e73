//! End-to-end tests of the host entry point.
//!
//! Each test writes a script tree into a temp directory, registers mock
//! handlers and drives `process_files` the way an embedding host would.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use sakura::blossom::Blossom;
use sakura::config::RuntimeConfig;
use sakura::error::SakuraError;
use sakura::item::BlossomItem;
use sakura::report::Reporter;
use sakura::runtime::SakuraRuntime;
use sakura::value::{Value, ValueMap};

/// Captures printed blocks for ordering assertions.
#[derive(Default)]
struct CollectingReporter {
    blocks: Mutex<Vec<String>>,
}

impl CollectingReporter {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn joined(&self) -> String {
        self.blocks.lock().unwrap().join("\n---\n")
    }
}

impl Reporter for CollectingReporter {
    fn print(&self, block: &str) {
        self.blocks.lock().unwrap().push(block.to_string());
    }
}

/// Echoes its "text" value into the output block.
struct EchoBlossom {
    calls: AtomicUsize,
}

impl EchoBlossom {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl Blossom for EchoBlossom {
    fn validate_input(&self, item: &BlossomItem) -> Result<(), String> {
        if item.values.contains_key("text") {
            Ok(())
        } else {
            Err("missing value \"text\"".to_string())
        }
    }

    fn execute(&self, item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        item.output = item.values.get("text").cloned().unwrap_or(Value::Null);
        Ok(())
    }
}

/// Always fails with a fixed message.
struct FailBlossom(&'static str);

impl Blossom for FailBlossom {
    fn validate_input(&self, _item: &BlossomItem) -> Result<(), String> {
        Ok(())
    }

    fn execute(&self, _item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
        Err(self.0.to_string())
    }
}

/// Flips a flag when executed, to observe parallel side effects.
struct FlagBlossom {
    flag: Arc<AtomicBool>,
}

impl Blossom for FlagBlossom {
    fn validate_input(&self, _item: &BlossomItem) -> Result<(), String> {
        Ok(())
    }

    fn execute(&self, _item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn write_script(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn quiet_runtime() -> (SakuraRuntime, Arc<CollectingReporter>) {
    let reporter = CollectingReporter::new();
    let runtime = SakuraRuntime::with_reporter(
        RuntimeConfig::default().with_workers(4),
        reporter.clone() as Arc<dyn Reporter>,
    );
    (runtime, reporter)
}

#[test]
fn test_unknown_blossom_fails_dry_run() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "root.sakura", "[foo]\nbar {}\n");

    let (runtime, _) = quiet_runtime();
    let err = runtime
        .process_files(dir.path(), &ValueMap::new(), true)
        .unwrap_err();

    let rendered = err.to_string();
    assert!(rendered.contains("unknown blossom-type"), "{rendered}");
    assert!(rendered.contains("bar"), "{rendered}");
}

#[test]
fn test_unknown_input_key_aborts_before_execution() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\n- x = 0\necho {\n- text = \"{{x}}\"\n}\n",
    );

    let (runtime, _) = quiet_runtime();
    let echo = EchoBlossom::new();
    runtime.add_blossom("echo", "echo", echo.clone() as Arc<dyn Blossom>);

    let mut initial = ValueMap::new();
    initial.insert("y".to_string(), Value::Int(3));

    let err = runtime
        .process_files(dir.path(), &initial, false)
        .unwrap_err();

    assert!(err.to_string().contains("y"), "{err}");
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sequential_print_ordering() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\n\
         echo(\"first\") {\n- text = \"AAA\"\n}\n\
         echo(\"second\") {\n- text = \"BBB\"\n}\n\
         echo(\"third\") {\n- text = \"CCC\"\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    runtime.add_blossom("echo", "echo", EchoBlossom::new());

    runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap();

    let output = reporter.joined();
    let a = output.find("AAA").expect("AAA should be printed");
    let b = output.find("BBB").expect("BBB should be printed");
    let c = output.find("CCC").expect("CCC should be printed");
    assert!(a < b && b < c, "{output}");
}

#[test]
fn test_parallel_aggregates_errors_and_keeps_sibling_effects() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\nparallel {\nfail1 {}\nfail2 {}\nflag {}\n}\n",
    );

    let (runtime, _) = quiet_runtime();
    let flag = Arc::new(AtomicBool::new(false));
    runtime.add_blossom("fail1", "fail1", Arc::new(FailBlossom("E1")));
    runtime.add_blossom("fail2", "fail2", Arc::new(FailBlossom("E2")));
    runtime.add_blossom(
        "flag",
        "flag",
        Arc::new(FlagBlossom {
            flag: Arc::clone(&flag),
        }),
    );

    let err = runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap_err();

    let rendered = err.to_string();
    assert!(rendered.contains("E1"), "{rendered}");
    assert!(rendered.contains("E2"), "{rendered}");
    assert!(flag.load(Ordering::SeqCst), "sibling success must still run");
}

#[test]
fn test_for_each_emits_elements_in_order() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\nfor (item in [1, 2, 3]) {\necho {\n- text = item\n}\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    runtime.add_blossom("echo", "echo", EchoBlossom::new());

    runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap();

    let blocks = reporter.blocks.lock().unwrap().clone();
    let outputs: Vec<&String> = blocks.iter().filter(|b| b.contains("- output:")).collect();
    assert_eq!(outputs.len(), 3, "{blocks:?}");
    assert!(outputs[0].ends_with("- output:\n1"), "{:?}", outputs[0]);
    assert!(outputs[1].ends_with("- output:\n2"), "{:?}", outputs[1]);
    assert!(outputs[2].ends_with("- output:\n3"), "{:?}", outputs[2]);
}

#[test]
fn test_dry_run_executes_nothing() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\necho {\n- text = \"never\"\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    let echo = EchoBlossom::new();
    runtime.add_blossom("echo", "echo", echo.clone() as Arc<dyn Blossom>);

    runtime
        .process_files(dir.path(), &ValueMap::new(), true)
        .unwrap();

    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    assert!(reporter.blocks.lock().unwrap().is_empty());
}

#[test]
fn test_initial_values_override_declared_parameters() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\n- who = \"default\"\necho {\n- text = \"hello {{who}}\"\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    runtime.add_blossom("echo", "echo", EchoBlossom::new());

    let mut initial = ValueMap::new();
    initial.insert("who".to_string(), Value::String("override".into()));

    runtime.process_files(dir.path(), &initial, false).unwrap();
    assert!(reporter.joined().contains("hello override"));
}

#[test]
fn test_subtree_call_across_files() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\nsubtree (\"sub/helper.sakura\") {\n- word = \"linked\"\n}\n",
    );
    write_script(
        dir.path(),
        "sub/helper.sakura",
        "[helper]\n- word = \"unset\"\necho {\n- text = \"{{word}}\"\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    runtime.add_blossom("echo", "echo", EchoBlossom::new());

    runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap();
    assert!(reporter.joined().contains("linked"));
}

#[test]
fn test_resource_call_by_blossom_syntax() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\ngreet {\n- word = \"resource\"\n}\n",
    );

    let (runtime, reporter) = quiet_runtime();
    runtime.add_blossom("echo", "echo", EchoBlossom::new());
    runtime
        .add_resource(
            "[greet]\n- word = \"unset\"\necho {\n- text = \"{{word}}\"\n}\n",
            "inline/greet.sakura",
        )
        .unwrap();

    runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap();
    assert!(reporter.joined().contains("resource"));
}

#[test]
fn test_validation_failure_reports_handler_message() {
    let dir = TempDir::new().unwrap();
    // The echo handler requires a "text" value; none is declared.
    write_script(dir.path(), "root.sakura", "[root]\necho {}\n");

    let (runtime, _) = quiet_runtime();
    let echo = EchoBlossom::new();
    runtime.add_blossom("echo", "echo", echo.clone() as Arc<dyn Blossom>);

    let err = runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap_err();

    assert!(matches!(err, SakuraError::Validation { .. }), "{err}");
    assert!(err.to_string().contains("missing value \"text\""));
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_runs_without_parallel_are_deterministic() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\nfor (i = 0; i < 4) {\necho {\n- text = i\n}\n}\n",
    );

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let (runtime, reporter) = quiet_runtime();
        runtime.add_blossom("echo", "echo", EchoBlossom::new());
        runtime
            .process_files(dir.path(), &ValueMap::new(), false)
            .unwrap();
        outputs.push(reporter.joined());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_deeply_nested_parallel_does_not_deadlock() {
    let dir = TempDir::new().unwrap();
    // Nesting depth exceeds the worker count on purpose.
    write_script(
        dir.path(),
        "root.sakura",
        "[root]\n\
         parallel {\nsequential {\nparallel {\nsequential {\nparallel {\n\
         echo {\n- text = \"bottom\"\n}\n\
         }\n}\n}\n}\n}\n",
    );

    let reporter = CollectingReporter::new();
    let runtime = SakuraRuntime::with_reporter(
        RuntimeConfig::default().with_workers(1),
        reporter.clone() as Arc<dyn Reporter>,
    );
    runtime.add_blossom("echo", "echo", EchoBlossom::new());

    runtime
        .process_files(dir.path(), &ValueMap::new(), false)
        .unwrap();
    assert!(reporter.joined().contains("bottom"));
}
