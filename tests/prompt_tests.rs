use commit_gen::prompt::{
    format_prompt, normalize_response, CHANGES_PLACEHOLDER, COMMIT_MESSAGE_TEMPLATE,
};

#[test]
fn template_has_exactly_one_placeholder() {
    assert_eq!(COMMIT_MESSAGE_TEMPLATE.matches(CHANGES_PLACEHOLDER).count(), 1);
    assert!(COMMIT_MESSAGE_TEMPLATE.starts_with("You are an expert senior programmer"));
    assert!(COMMIT_MESSAGE_TEMPLATE.ends_with("only return the commit message"));
}

#[test]
fn diff_is_inserted_verbatim() {
    let diff = "diff --git a/x b/x\n+uses {changes} literally\n";
    let prompt = format_prompt(diff);

    assert!(prompt.contains(diff));
    assert!(prompt.contains("read these changes diff --git"));
    assert!(prompt.contains("literally\n made to the repository files"));
}

#[test]
fn chatty_replies_reduce_to_the_message() {
    let raw = "The commit message would be:\n\n```\n\"Add retry to upload client\"\n```\n";
    assert_eq!(normalize_response(raw), "Add retry to upload client");
}
