use super::*;
use tempfile::TempDir;

#[test]
fn loads_directory_in_sorted_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("b.txt"), "second").expect("write b");
    fs::write(temp_dir.path().join("a.txt"), "first").expect("write a");
    fs::write(temp_dir.path().join("c.txt"), "third").expect("write c");

    let documents = load_documents(temp_dir.path()).expect("should load");

    let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert!(documents[0].name.ends_with("a.txt"));
}

#[test]
fn single_file_is_the_only_document() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("endpoint.txt");
    fs::write(&path, "POST /v2/people-search").expect("write file");

    let documents = load_documents(&path).expect("should load");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].name, path.to_string_lossy());
    assert_eq!(documents[0].content, "POST /v2/people-search");
}

#[test]
fn nested_directories_are_not_descended() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::create_dir(temp_dir.path().join("nested")).expect("create nested");
    fs::write(temp_dir.path().join("nested/inner.txt"), "hidden").expect("write inner");
    fs::write(temp_dir.path().join("top.txt"), "visible").expect("write top");

    let documents = load_documents(temp_dir.path()).expect("should load");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].content, "visible");
}

#[test]
fn unreadable_and_empty_files_are_skipped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("binary.bin"), [0xff, 0xfe, 0x00, 0xc3]).expect("write bin");
    fs::write(temp_dir.path().join("empty.txt"), "").expect("write empty");
    fs::write(temp_dir.path().join("blank.txt"), "  \n\t").expect("write blank");
    fs::write(temp_dir.path().join("good.txt"), "Endpoint docs").expect("write good");

    let documents = load_documents(temp_dir.path()).expect("should load");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].content, "Endpoint docs");
}

#[test]
fn directory_of_only_bad_files_yields_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("one.bin"), [0xc3, 0x28]).expect("write one");
    fs::write(temp_dir.path().join("two.txt"), "").expect("write two");

    let documents = load_documents(temp_dir.path()).expect("should load");
    assert!(documents.is_empty());
}

#[test]
fn missing_root_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = load_documents(&temp_dir.path().join("does-not-exist"));
    assert!(matches!(result, Err(crate::ChatError::Io(_))));
}
