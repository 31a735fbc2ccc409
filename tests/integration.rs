use slidebolt::{build_link, decode_link, Config, DirectiveParser, SnippetChecker};
use tempfile::TempDir;

#[test]
fn test_snippet_to_link_round_trip() {
    let config = Config::default();
    let text = "\
/// compiler=g92
/// options=-std=c++17
// setup
  #include <iostream>
int main() { std::cout << 42; }
";
    let parsed = DirectiveParser::new(&config).parse(text);
    assert_eq!(parsed.info.display_source, "int main() { std::cout << 42; }\n");

    let link = build_link(&parsed.info, &config.explorer.theme).unwrap();
    let state = decode_link(&link).unwrap();
    let editor = &state["content"][0]["content"][0]["componentState"];
    assert_eq!(editor["source"], parsed.info.source.as_str());
    assert!(parsed.info.source.contains("#include <iostream>"));
}

#[test]
fn test_prepare_expanded_deck() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("chapter")).unwrap();
    std::fs::write(dir.path().join("index.md"), "# Deck\nFILE: chapter/slides.md\n").unwrap();
    std::fs::write(
        dir.path().join("chapter/slides.md"),
        "## Slide\n```cpp [2]\n/// fails=missing semicolon\nint x\n```\n",
    )
    .unwrap();

    let markdown = slidebolt::preprocess::Preprocessor::new(dir.path())
        .process_file(&dir.path().join("index.md"))
        .unwrap();

    let checker = SnippetChecker::new(Config::default()).unwrap();
    let prepared = checker.prepare(&markdown);
    assert_eq!(prepared.len(), 1);
    assert!(prepared[0].1.info.should_fail());
    assert_eq!(prepared[0].1.info.source, "int x\n");
}
