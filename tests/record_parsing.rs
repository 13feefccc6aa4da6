use repeci::record::{PaperDraft, RecordParser, RejectReason, Rejection};

const ARTICLE: &str = "Template-Type: ReDIF-Article 1.0";

fn parse(text: &str) -> (Vec<Result<PaperDraft, Rejection>>, usize) {
    let parser = RecordParser::default();
    let mut records = parser.parse(text.lines());
    let parsed: Vec<_> = records.by_ref().collect();
    (parsed, records.skipped())
}

#[test]
fn single_article_becomes_a_draft() {
    let text = format!("{ARTICLE}\nTitle: A\nAuthor-Name: Smith\nClassification-JEL: C10\nHandle: RePEc:x:1\n");
    let (records, skipped) = parse(&text);
    assert_eq!(skipped, 0);
    assert_eq!(records.len(), 1);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(draft.handle(), "RePEc:x:1");
    assert_eq!(draft.title(), Some("A"));
    assert_eq!(draft.authors(), ["Smith".to_string()]);
    assert_eq!(draft.classifications().iter().collect::<Vec<_>>(), vec!["C10"]);
    assert_eq!(draft.line(), 5);
}

#[test]
fn bad_classification_rejects_the_record_and_names_its_handle() {
    let text = format!("{ARTICLE}\nTitle: B\nAuthor-Name: Smith\nClassification-JEL: C1\nHandle: RePEc:x:2\n");
    let (records, _) = parse(&text);
    assert_eq!(records.len(), 1);
    let rejection = records[0].as_ref().expect_err("rejection");
    assert_eq!(rejection.handle.as_deref(), Some("RePEc:x:2"));
    assert_eq!(rejection.line, 5);
    assert_eq!(
        rejection.reason,
        RejectReason::ClassificationLength { code: "C1".into() }
    );
}

#[test]
fn first_rejection_reason_wins() {
    let text = format!("{ARTICLE}\nYear: 19x9\nClassification-JEL: C1\nHandle: RePEc:x:3\n");
    let (records, _) = parse(&text);
    let rejection = records[0].as_ref().expect_err("rejection");
    assert_eq!(rejection.reason.kind(), "non_integer_year");
}

#[test]
fn year_is_parsed_as_integer() {
    let text = format!("{ARTICLE}\nYear: 2001\nAuthor-Name: Smith\nHandle: RePEc:x:4\n");
    let (records, _) = parse(&text);
    assert_eq!(records[0].as_ref().expect("draft").year(), Some(2001));
}

#[test]
fn record_without_authors_is_rejected() {
    let text = format!("{ARTICLE}\nTitle: Lonely\nHandle: RePEc:x:5\n");
    let (records, _) = parse(&text);
    assert_eq!(records[0].as_ref().expect_err("rejection").reason, RejectReason::NoAuthors);
}

#[test]
fn non_articles_are_skipped_and_do_not_leak_fields() {
    let text = format!(
        "Template-Type: ReDIF-Paper 1.0\nTitle: Working paper\nAuthor-Name: Jones\nHandle: RePEc:x:wp\n\
         {ARTICLE}\nAuthor-Name: Smith\nHandle: RePEc:x:6\n\
         Author-Name: Nobody\nHandle: RePEc:x:7\n"
    );
    let (records, skipped) = parse(&text);
    assert_eq!(skipped, 2);
    assert_eq!(records.len(), 1);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(draft.handle(), "RePEc:x:6");
    assert_eq!(draft.title(), None);
    assert_eq!(draft.authors(), ["Smith".to_string()]);
}

#[test]
fn unknown_fields_and_lines_without_colon_are_ignored() {
    let text = format!(
        "{ARTICLE}\nAbstract: long text\ncontinuation of the abstract\nAuthor-Name: Smith\nAuthor-Email: s@x.org\nHandle: RePEc:x:8\n"
    );
    let (records, _) = parse(&text);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(draft.authors(), ["Smith".to_string()]);
}

#[test]
fn last_title_wins_and_authors_collapse() {
    let text = format!(
        "{ARTICLE}\nTitle: First\nTitle: Second\nAuthor-Name: Smith\nAuthor-Name: Jones\nAuthor-Name: Smith\nHandle: RePEc:x:9\n"
    );
    let (records, _) = parse(&text);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(draft.title(), Some("Second"));
    assert_eq!(draft.authors(), ["Smith".to_string(), "Jones".to_string()]);
}

#[test]
fn classification_lists_are_split_trimmed_and_deduplicated() {
    let text = format!(
        "{ARTICLE}\nAuthor-Name: Smith\nClassification-JEL: C10, D22,C10 ,\nClassification-JEL: E31\nHandle: RePEc:x:10\n"
    );
    let (records, _) = parse(&text);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(
        draft.classifications().iter().collect::<Vec<_>>(),
        vec!["C10", "D22", "E31"]
    );
}

#[test]
fn open_article_at_end_of_input_is_unterminated() {
    let text = format!("{ARTICLE}\nAuthor-Name: Smith\nHandle: RePEc:x:11\n{ARTICLE}\nTitle: Cut off\n");
    let (records, _) = parse(&text);
    assert_eq!(records.len(), 2);
    assert!(records[0].is_ok());
    let rejection = records[1].as_ref().expect_err("rejection");
    assert_eq!(rejection.reason, RejectReason::Unterminated);
    assert_eq!(rejection.handle, None);
}

#[test]
fn field_names_ignore_case() {
    let text = "template-type: ReDIF-Article 1.0\r\nAUTHOR-NAME: Smith\r\nhandle: RePEc:x:12\r\n";
    let (records, _) = parse(text);
    assert_eq!(records[0].as_ref().expect("draft").handle(), "RePEc:x:12");
}

#[test]
fn parsing_is_lazy() {
    let parser = RecordParser::default();
    let lines = format!("{ARTICLE}\nAuthor-Name: Smith\nHandle: RePEc:x:13\n{ARTICLE}\nAuthor-Name: Jones\nHandle: RePEc:x:14\n");
    let mut records = parser.parse(lines.lines());
    assert_eq!(records.next().expect("first").expect("draft").handle(), "RePEc:x:13");
    assert_eq!(records.next().expect("second").expect("draft").handle(), "RePEc:x:14");
    assert!(records.next().is_none());
}

#[test]
fn template_type_after_fields_does_not_drop_the_article() {
    let text = format!(
        "{ARTICLE}\nTitle: A\nAuthor-Name: Smith\nTemplate-Type: ReDIF-Paper 1.0\nAuthor-Name: Jones\nHandle: RePEc:x:1\n"
    );
    let (records, skipped) = parse(&text);
    assert_eq!(skipped, 0);
    assert_eq!(records.len(), 1);
    let draft = records[0].as_ref().expect("draft");
    assert_eq!(draft.handle(), "RePEc:x:1");
    assert_eq!(draft.authors(), ["Smith".to_string(), "Jones".to_string()]);
}
