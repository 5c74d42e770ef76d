use super::*;
use shared::domain::TokenStatus;
use anyhow::anyhow;
use client_core::Receipt;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<Receipt>>,
    fail: bool,
}

impl ReceiptSink for RecordingSink {
    fn deliver(&self, receipt: &Receipt) -> anyhow::Result<()> {
        if self.fail {
            return Err(anyhow!("printer offline"));
        }
        self.delivered
            .lock()
            .expect("sink lock")
            .push(receipt.clone());
        Ok(())
    }
}

async fn controller_with(codes: &[&str]) -> (Controller, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for code in codes {
        storage
            .insert_token(code, 500000, "NGN")
            .await
            .expect("insert")
            .expect("fresh code");
    }
    let store: Arc<dyn TokenStore> = Arc::new(storage.clone());
    (RedemptionController::new(store), storage)
}

fn redeem_command(code: &str, print: bool) -> Command {
    Command::Redeem {
        code: code.to_string(),
        print,
    }
}

#[tokio::test]
async fn redeem_command_fails_for_unknown_code() {
    let (controller, _storage) = controller_with(&[]).await;
    let sink = RecordingSink::default();

    let err = run(&controller, &sink, redeem_command("NOPE", false))
        .await
        .expect_err("unknown code");
    assert!(err.to_string().contains("NOPE"));
}

#[tokio::test]
async fn second_redeem_command_fails() {
    let (controller, _storage) = controller_with(&["PROMO1"]).await;
    let sink = RecordingSink::default();

    run(&controller, &sink, redeem_command("PROMO1", true))
        .await
        .expect("first redemption");
    assert_eq!(sink.delivered.lock().expect("sink lock").len(), 1);

    controller.reset().await;
    run(&controller, &sink, redeem_command("PROMO1", true))
        .await
        .expect_err("already redeemed");
    assert_eq!(sink.delivered.lock().expect("sink lock").len(), 1);
}

#[tokio::test]
async fn lookup_command_fails_unless_token_is_issued() {
    let (controller, storage) = controller_with(&["FRESH", "CANCEL"]).await;
    let sink = RecordingSink::default();

    run(
        &controller,
        &sink,
        Command::Lookup {
            code: "FRESH".into(),
        },
    )
    .await
    .expect("issued token");

    let cancel = storage
        .find_token_by_code("CANCEL")
        .await
        .expect("find")
        .expect("present");
    storage
        .update_status_conditional(cancel.id, TokenStatus::Issued, TokenStatus::Void, None)
        .await
        .expect("void");
    run(
        &controller,
        &sink,
        Command::Lookup {
            code: "CANCEL".into(),
        },
    )
    .await
    .expect_err("void token");
}

#[tokio::test]
async fn undelivered_receipt_fails_after_redemption() {
    let (controller, storage) = controller_with(&["PROMO1"]).await;
    let sink = RecordingSink {
        fail: true,
        ..RecordingSink::default()
    };

    let err = run(&controller, &sink, redeem_command("PROMO1", true))
        .await
        .expect_err("printer offline");
    assert!(err.to_string().contains("receipt"));

    let stored = storage
        .find_token_by_code("PROMO1")
        .await
        .expect("find")
        .expect("present");
    assert_eq!(stored.status, TokenStatus::Redeemed);
}
