use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempdir::TempDir;

fn quince_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_quince"))
}

fn quince(store: &Path, args: &[&str]) -> Output {
    Command::new(quince_bin())
        .arg("--store")
        .arg(store)
        .args(args)
        .output()
        .expect("run quince")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn write_ttl(path: &Path) {
    let content = "@prefix ex: <http://example.org/> .\n\
                   ex:a ex:p ex:b ;\n\
                   \x20    ex:q \"one\" .\n\
                   ex:b ex:p ex:c .\n";
    fs::write(path, content).expect("write ttl");
}

#[test]
fn commands_fail_without_store() {
    let tmp = TempDir::new("quince-cli").unwrap();
    let out = quince(&tmp.path().join("missing"), &["stats"]);
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("Could not find store directory"), "stderr: {}", err);
}

#[test]
fn init_refuses_to_overwrite() {
    let tmp = TempDir::new("quince-cli").unwrap();
    let store = tmp.path().join("store");
    assert!(quince(&store, &["init"]).status.success());
    assert!(store.join("quince.json").exists());
    assert!(!quince(&store, &["init"]).status.success());
    assert!(quince(&store, &["init", "--overwrite"]).status.success());
}

#[test]
fn import_query_and_drop() {
    let tmp = TempDir::new("quince-cli").unwrap();
    let store = tmp.path().join("store");
    let data = tmp.path().join("data.ttl");
    write_ttl(&data);

    assert!(quince(&store, &["init", "--split-threshold", "2"]).status.success());
    let out = quince(
        &store,
        &["import", data.to_str().unwrap(), "--graph", "http://example.org/g"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).starts_with("Imported 3 statements"));

    let out = quince(&store, &["subject", "http://example.org/a"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).lines().count(), 2);

    let out = quince(&store, &["object", "http://example.org/c"]);
    assert_eq!(
        stdout(&out).trim(),
        "<http://example.org/b> <http://example.org/p> <http://example.org/c> <http://example.org/g>."
    );

    let out = quince(&store, &["stats", "--json"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("\"subjects\": 2"), "{}", text);
    assert!(text.contains("\"quads\": 3"), "{}", text);

    let out = quince(&store, &["drop-graph", "http://example.org/g"]);
    assert!(out.status.success());
    let out = quince(&store, &["stats"]);
    assert!(stdout(&out).contains("Quads: 0"));
}

#[test]
fn apply_diff_and_sparql() {
    let tmp = TempDir::new("quince-cli").unwrap();
    let store = tmp.path().join("store");
    assert!(quince(&store, &["init"]).status.success());

    let diff = "diff --git a/_s.nq b/_s.nq\n\
                new file mode 100644\n\
                --- /dev/null\n\
                +++ b/_s.nq\n\
                @@ -0,0 +1 @@\n\
                +<http://example.org/a> <http://example.org/p> \"x\" <http://example.org/g>.\n";
    let diff_file = tmp.path().join("change.diff");
    fs::write(&diff_file, diff).unwrap();

    let out = quince(&store, &["apply-diff", diff_file.to_str().unwrap(), "--sparql"]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("INSERT DATA {"));

    let out = quince(&store, &["apply-diff", diff_file.to_str().unwrap()]);
    assert!(out.status.success());
    let out = quince(&store, &["subject", "http://example.org/a"]);
    assert_eq!(stdout(&out).lines().count(), 1);
}
