//! End-to-end sync runs against a scripted mailbox and model.

mod common;

use std::sync::atomic::Ordering;

use complaintlog::export::{load_report, BASE_COLUMNS};
use complaintlog::parts::is_valid_part_number;
use complaintlog::{CancellationFlag, ComplaintCase, ReconcileError, MISSING_PART_NUMBER};

use common::*;

const SINCE: &str = "2025-03-01T00:00:00Z";
const ACME_KEY: &str = "acmecom-12345-ab-ncmr-2024-00987";

fn cracked_housing(conversation_id: &str, sender: &str, received: &str) -> MessageBuilder {
    MessageBuilder::new(conversation_id)
        .subject("RE: PN 12345-AB cracked housing")
        .from(sender)
        .body("Housings cracked on arrival. See NCMR 2024-00987.")
        .received(received)
}

fn script_cracked_housing(harness: &TestHarness) {
    harness.model.reply_when(
        "cracked housing",
        complaint_reply("Housings for 12345-AB arrived cracked.", "Product", "12345-AB"),
    );
}

#[tokio::test]
async fn test_new_complaint_is_inserted() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.threads, 1);
    assert!(summary.report_due);
    assert_eq!(summary.updates_log.len(), 1);

    let case = harness.case("conv-a").expect("case stored");
    assert_eq!(case.case_key, ACME_KEY);
    assert_eq!(case.part_number, "12345-AB");
    assert_eq!(case.category, "Product");
    assert_eq!(case.subject, "PN 12345-AB cracked housing");
    assert_eq!(case.from_email, "bob@acme.com");
    assert_eq!(case.initiator_email, "bob@acme.com");
    assert_eq!(case.received_utc, utc("2025-03-10T14:00:00Z"));
    assert_eq!(case.first_seen_utc, Some(utc("2025-03-10T14:00:00Z")));
    assert_eq!(case.thread_url, "https://outlook.example/thread/conv-a");
}

#[tokio::test]
async fn test_html_body_is_classified_as_text() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(
        cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z")
            .html("<html><body><p>Housings <b>cracked</b> on arrival.</p><p>See NCMR 2024-00987.</p></body></html>")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    assert_eq!(harness.case("conv-a").unwrap().case_key, ACME_KEY);
}

#[tokio::test]
async fn test_newsletter_is_gated_before_the_model() {
    let harness = TestHarness::new();
    harness.deliver(
        MessageBuilder::new("conv-news")
            .subject("Lesson of the Week")
            .from("no-reply@culturewise.com")
            .body("This week: handling returns and damage claims.")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(summary.new, 0);
    assert!(!summary.report_due);
    assert_eq!(harness.model.call_count(), 0);
    assert!(harness.cases().is_empty());
}

#[tokio::test]
async fn test_message_without_complaint_vocabulary_is_gated() {
    let harness = TestHarness::new();
    harness.deliver(
        MessageBuilder::new("conv-lunch")
            .subject("Lunch on Friday?")
            .from("dana@acme.com")
            .body("Pizza at noon, see you there.")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(harness.model.call_count(), 0);
}

#[tokio::test]
async fn test_gated_message_only_advances_existing_row() {
    let harness = TestHarness::new();
    harness.seed(ComplaintCase {
        conversation_id: "conv-news".to_string(),
        received_utc: utc("2025-03-02T08:00:00Z"),
        from_email: "no-reply@culturewise.com".to_string(),
        subject: "Earlier thread".to_string(),
        part_number: MISSING_PART_NUMBER.to_string(),
        category: "Other".to_string(),
        summary: "Kept summary".to_string(),
        case_key: "culturewisecom-earlier-thread".to_string(),
        thread_url: String::new(),
        first_seen_utc: Some(utc("2025-03-02T08:00:00Z")),
        initiator_email: "no-reply@culturewise.com".to_string(),
    });
    harness.deliver(
        MessageBuilder::new("conv-news")
            .subject("Lesson of the Week")
            .from("no-reply@culturewise.com")
            .body("Weekly reading.")
            .received("2025-03-10T14:00:00Z")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert!(!summary.report_due);
    let case = harness.case("conv-news").unwrap();
    assert_eq!(case.received_utc, utc("2025-03-10T14:00:00Z"));
    assert_eq!(case.summary, "Kept summary");
    assert_eq!(case.subject, "Earlier thread");
    assert_eq!(case.first_seen_utc, Some(utc("2025-03-02T08:00:00Z")));
}

#[tokio::test]
async fn test_not_a_complaint_touches_existing_row() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.run(SINCE).await;

    harness.deliver(
        MessageBuilder::new("conv-a")
            .subject("RE: received")
            .from("bob@acme.com")
            .body("Thanks, the replacement units arrived fine.")
            .received("2025-03-12T10:00:00Z")
            .build(),
    );
    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(summary.updated, 0);
    let case = harness.case("conv-a").unwrap();
    assert_eq!(case.received_utc, utc("2025-03-12T10:00:00Z"));
    assert_eq!(case.summary, "Housings for 12345-AB arrived cracked.");
    assert_eq!(case.case_key, ACME_KEY);
}

#[tokio::test]
async fn test_second_conversation_merges_into_existing_case() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-10T14:00:00Z").build());
    harness.run(SINCE).await;

    harness.deliver(
        cracked_housing("conv-y", "bob@acme.com", "2025-03-12T09:00:00Z")
            .body(
                "Second shipment also cracked, NCMR 2024-00987 still open.\n\n\
                 From: Alice <alice@acme.com>\n\
                 Sent: Monday, March 3, 2025 9:00 AM\n\
                 To: Quality\n\
                 Subject: PN 12345-AB cracked housing\n\n\
                 First report of cracked housings.",
            )
            .build(),
    );
    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 1);
    assert!(summary.report_due);

    let cases = harness.cases();
    assert_eq!(cases.len(), 1);
    let case = &cases[0];
    assert_eq!(case.conversation_id, "conv-x");
    assert_eq!(case.case_key, ACME_KEY);
    assert_eq!(case.received_utc, utc("2025-03-12T09:00:00Z"));
    assert_eq!(case.from_email, "bob@acme.com");
    assert_eq!(case.first_seen_utc, Some(utc("2025-03-03T14:00:00Z")));
    assert_eq!(case.initiator_email, "alice@acme.com");
    assert!(harness.case("conv-y").is_none());
}

#[tokio::test]
async fn test_merges_always_target_the_key_owner() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-11T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-z", "carl@acme.com", "2025-03-12T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    assert_eq!(summary.updated, 2);
    assert_eq!(
        summary
            .updates_log
            .iter()
            .filter(|line| line.starts_with("Merged duplicate") && line.ends_with(ACME_KEY))
            .count(),
        2
    );

    let cases = harness.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].conversation_id, "conv-x");
    assert_eq!(cases[0].received_utc, utc("2025-03-12T14:00:00Z"));
    assert_eq!(cases[0].from_email, "carl@acme.com");
    assert_eq!(cases[0].initiator_email, "alice@acme.com");
    assert!(harness.case("conv-y").is_none());
    assert!(harness.case("conv-z").is_none());
}

#[tokio::test]
async fn test_older_conversation_does_not_overwrite_newer_owner() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-12T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    assert_eq!(summary.unchanged, 1);
    let cases = harness.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].from_email, "alice@acme.com");
}

#[tokio::test]
async fn test_rejected_merge_is_not_reclassified() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-12T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    harness.run(SINCE).await;
    assert_eq!(harness.model.call_count(), 2);

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.unchanged, 2);
    assert_eq!(harness.model.call_count(), 2);
    assert!(harness.case("conv-y").is_none());
}

#[tokio::test]
async fn test_skipped_conversation_is_reevaluated_on_new_mail() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-12T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.run(SINCE).await;

    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-13T09:00:00Z").build());
    let summary = harness.run(SINCE).await;

    assert_eq!(summary.updated, 1);
    assert_eq!(harness.model.call_count(), 3);
    let owner = harness.case("conv-x").unwrap();
    assert_eq!(owner.received_utc, utc("2025-03-13T09:00:00Z"));
    assert_eq!(owner.from_email, "bob@acme.com");
}

#[tokio::test]
async fn test_uncorroborated_model_part_number_is_discarded() {
    let harness = TestHarness::new();
    harness.model.reply_when(
        "forks went through",
        complaint_reply("Two crates damaged in transit.", "Damage/Transit", "ZX-99881"),
    );
    harness.deliver(
        MessageBuilder::new("conv-d")
            .subject("Damaged crates")
            .from("carol@globex.com")
            .body("Two crates arrived damaged, forks went through the side.")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    let case = harness.case("conv-d").unwrap();
    assert_eq!(case.part_number, MISSING_PART_NUMBER);
    assert_eq!(case.category, "Damage/Transit");
    assert_eq!(case.case_key, "globexcom-damaged-crates");
}

#[tokio::test]
async fn test_model_part_number_found_in_text_is_accepted() {
    let harness = TestHarness::with_master_parts(&[]);
    harness.model.reply_when(
        "bent brackets",
        complaint_reply("Brackets bent.", "Product", "BRK-4410"),
    );
    harness.deliver(
        MessageBuilder::new("conv-b")
            .subject("bent brackets")
            .from("erin@initech.com")
            .body("The BRK-4410 units are bent, please send a replacement.")
            .build(),
    );

    harness.run(SINCE).await;

    assert_eq!(harness.case("conv-b").unwrap().part_number, "BRK-4410");
}

#[tokio::test]
async fn test_stored_part_numbers_are_valid_or_sentinel() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.model.reply_when(
        "forks went through",
        complaint_reply("Crates damaged.", "Damage/Transit", "thanks"),
    );
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(
        MessageBuilder::new("conv-d")
            .subject("Damaged crates")
            .from("carol@globex.com")
            .body("Crates arrived damaged, forks went through the side.")
            .build(),
    );

    harness.run(SINCE).await;

    let cases = harness.cases();
    assert_eq!(cases.len(), 2);
    for case in cases {
        assert!(
            case.part_number == MISSING_PART_NUMBER || is_valid_part_number(&case.part_number),
            "invalid part number '{}'",
            case.part_number
        );
    }
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    harness.run(SINCE).await;
    let before = harness.cases();
    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 1);
    assert!(!summary.report_due);
    assert!(summary.updates_log.is_empty());
    assert_eq!(harness.cases(), before);
    assert_eq!(harness.model.call_count(), 1);
}

#[tokio::test]
async fn test_rerun_with_fractional_received_time_is_idempotent() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00.500Z").build());

    let first = harness.run(SINCE).await;
    assert_eq!(first.new, 1);
    assert_eq!(
        harness.case("conv-a").unwrap().received_utc,
        utc("2025-03-10T14:00:00.500Z")
    );

    let before = harness.cases();
    let second = harness.run(SINCE).await;

    assert_eq!(second.new, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 1);
    assert!(!second.report_due);
    assert_eq!(harness.cases(), before);
    assert_eq!(harness.model.call_count(), 1);
}

#[tokio::test]
async fn test_unchanged_conversations_are_not_downloaded() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-b", "carl@acme.com", "2025-03-11T14:00:00Z").build());

    harness.run(SINCE).await;
    assert_eq!(harness.mail.message_fetch_count(), 2);

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.unchanged, 2);
    assert_eq!(harness.mail.message_fetch_count(), 2);
    assert_eq!(harness.model.call_count(), 2);
}

#[tokio::test]
async fn test_only_the_latest_message_body_is_downloaded() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-11T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-12T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.new, 1);
    assert_eq!(harness.mail.message_fetch_count(), 1);
}

#[tokio::test]
async fn test_message_gone_before_evaluation_is_left_alone() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    let message = cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build();
    harness.mail.withdraw_after_listing(&message.id);
    harness.deliver(message);

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.new, 0);
    assert_eq!(harness.model.call_count(), 0);
    assert!(harness.cases().is_empty());
}

#[tokio::test]
async fn test_first_seen_and_initiator_survive_later_replies() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(
        cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z")
            .body(
                "Still cracked, NCMR 2024-00987.\n\n\
                 From: Alice <alice@acme.com>\n\
                 Sent: Monday, March 3, 2025 9:00 AM\n\
                 Subject: PN 12345-AB cracked housing\n\n\
                 Housings cracked.",
            )
            .build(),
    );
    harness.run(SINCE).await;

    let first = harness.case("conv-a").unwrap();
    assert_eq!(first.first_seen_utc, Some(utc("2025-03-03T14:00:00Z")));
    assert_eq!(first.initiator_email, "alice@acme.com");

    harness.deliver(
        cracked_housing("conv-a", "carl@acme.com", "2025-03-14T16:30:00Z")
            .body("Any news on NCMR 2024-00987? Housings still cracked.")
            .build(),
    );
    let summary = harness.run(SINCE).await;

    assert_eq!(summary.updated, 1);
    let later = harness.case("conv-a").unwrap();
    assert_eq!(later.received_utc, utc("2025-03-14T16:30:00Z"));
    assert_eq!(later.from_email, "carl@acme.com");
    assert_eq!(later.first_seen_utc, Some(utc("2025-03-03T14:00:00Z")));
    assert_eq!(later.initiator_email, "alice@acme.com");
}

#[tokio::test]
async fn test_latest_message_of_a_conversation_is_evaluated() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(
        cracked_housing("conv-a", "bob@acme.com", "2025-03-11T14:00:00Z")
            .id("later")
            .build(),
    );
    harness.deliver(
        cracked_housing("conv-a", "alice@acme.com", "2025-03-10T14:00:00Z")
            .id("earlier")
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.threads, 1);
    assert_eq!(harness.model.call_count(), 1);
    let case = harness.case("conv-a").unwrap();
    assert_eq!(case.received_utc, utc("2025-03-11T14:00:00Z"));
    assert_eq!(case.from_email, "bob@acme.com");
}

#[tokio::test]
async fn test_messages_without_ids_are_counted_not_evaluated() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(
        cracked_housing("orphan", "bob@acme.com", "2025-03-10T15:00:00Z")
            .without_conversation()
            .build(),
    );
    harness.deliver(
        cracked_housing("conv-b", "bob@acme.com", "2025-03-10T16:00:00Z")
            .without_timestamp()
            .build(),
    );

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.threads, 1);
    assert_eq!(summary.new, 1);
    assert!(harness.case("conv-b").is_none());
}

#[tokio::test]
async fn test_all_pages_are_read() {
    let harness = TestHarness::new();
    harness.mail.set_page_size(2);
    harness.model.reply_when(
        "rework",
        complaint_reply("Lot needs rework.", "Product", ""),
    );
    for i in 0..5 {
        harness.deliver(
            MessageBuilder::new(&format!("conv-{}", i))
                .subject(&format!("Lot {} needs rework", i))
                .from(&format!("qa{}@vendor{}.com", i, i))
                .body("Please rework the lot.")
                .received(&format!("2025-03-1{}T10:00:00Z", i))
                .build(),
        );
    }

    let summary = harness.run(SINCE).await;

    assert_eq!(harness.mail.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(summary.checked, 5);
    assert_eq!(summary.threads, 5);
    assert_eq!(summary.new, 5);
    assert_eq!(harness.cases().len(), 5);
}

#[tokio::test]
async fn test_mail_before_since_is_ignored() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-02-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.checked, 0);
    assert!(harness.cases().is_empty());
}

#[tokio::test]
async fn test_model_outage_degrades_to_not_a_complaint() {
    let harness = TestHarness::new();
    harness.model.outage.store(true, Ordering::SeqCst);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(summary.new, 0);
    assert_eq!(harness.model.call_count(), 3);
    assert_eq!(harness.sleeper.delays.lock().unwrap().len(), 2);
    assert!(harness.cases().is_empty());
}

#[tokio::test]
async fn test_malformed_model_output_is_retried() {
    let harness = TestHarness::new();
    harness
        .model
        .reply_when("cracked housing", "{\"is_complaint\": true, \"summary\": ".to_string());
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(harness.model.call_count(), 3);
}

#[tokio::test]
async fn test_mail_failure_aborts_the_run() {
    let harness = TestHarness::new();
    harness.mail.fail_fetch.store(true, Ordering::SeqCst);

    let result = harness.try_run(SINCE, &CancellationFlag::new()).await;

    assert!(matches!(result, Err(ReconcileError::Mail(_))));
}

#[tokio::test]
async fn test_cancelled_run_stops_without_writing() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.mail.set_page_size(1);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-b", "bob@acme.com", "2025-03-11T14:00:00Z").build());

    let cancel = CancellationFlag::new();
    harness.mail.cancel_after_first_page(cancel.clone());
    let summary = harness.try_run(SINCE, &cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(harness.mail.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(summary.new, 0);
    assert!(harness.cases().is_empty());
}

#[tokio::test]
async fn test_conversation_start_pushes_first_seen_earlier() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness
        .mail
        .set_earliest("conv-a", "2025-03-01T12:00:00Z", "dana@acme.com");
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    harness.run(SINCE).await;

    let case = harness.case("conv-a").unwrap();
    assert_eq!(case.first_seen_utc, Some(utc("2025-03-01T12:00:00Z")));
    assert_eq!(case.initiator_email, "bob@acme.com");
    assert_eq!(harness.mail.earliest_lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_conversation_start_lookup_failure_is_ignored() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.mail.fail_earliest.store(true, Ordering::SeqCst);
    harness.deliver(cracked_housing("conv-a", "bob@acme.com", "2025-03-10T14:00:00Z").build());

    let summary = harness.run(SINCE).await;

    assert_eq!(summary.new, 1);
    assert_eq!(
        harness.case("conv-a").unwrap().first_seen_utc,
        Some(utc("2025-03-10T14:00:00Z"))
    );
}

#[tokio::test]
async fn test_report_has_one_row_per_case() {
    let harness = TestHarness::new();
    script_cracked_housing(&harness);
    harness.model.reply_when(
        "forks went through",
        complaint_reply("Crates damaged.", "Damage/Transit", ""),
    );
    harness.deliver(cracked_housing("conv-x", "alice@acme.com", "2025-03-10T14:00:00Z").build());
    harness.deliver(cracked_housing("conv-y", "bob@acme.com", "2025-03-11T14:00:00Z").build());
    harness.deliver(
        MessageBuilder::new("conv-d")
            .subject("Damaged crates")
            .from("carol@globex.com")
            .body("Crates arrived damaged, forks went through the side.")
            .received("2025-03-12T14:00:00Z")
            .build(),
    );
    harness.run(SINCE).await;

    let report = load_report(&harness.db, chrono_tz::America::New_York).unwrap();

    assert_eq!(report.columns, BASE_COLUMNS.map(String::from).to_vec());
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0][0], "2025-03-12 10:00");
    assert_eq!(report.rows[0][1], "carol@globex.com");
    assert_eq!(report.rows[1][0], "2025-03-10 10:00");
    assert_eq!(report.rows[1][2], "12345-AB");
}
