//! Invoice entry generation against a seeded database.

mod common;

use abaco_accounting::keys;
use abaco_core::{Document, DocumentKind, Money, Operation, TaxRegime, TradeSide};
use abaco_db::DocumentRepository;
use common::{date, document, line, money, movement, subject, Fixture};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_sale_invoice_entry_is_balanced() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(TradeSide::Sale, "FA1", date(2, 10), &[(1, 100, Some("IVA21"))])
        .await;
    assert_eq!(doc.total, money(121));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(entry.amount, money(121));
    assert_eq!(entry.document.as_deref(), Some("FA1"));
    assert_eq!(doc.accounting_entry_id, Some(entry.id));

    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4300000001", 121, 0),
            movement("4770000000", 0, 21),
            movement("7000000000", 0, 100),
        ]
    );

    let vat_line = &fx.lines(entry.id).await[1];
    assert_eq!(vat_line.tax_base, Some(money(100)));
    assert_eq!(vat_line.counterpart.as_deref(), Some("4300000001"));

    let mut conn = fx.db.acquire().await.unwrap();
    let stored = DocumentRepository::new(&mut conn).get(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.accounting_entry_id, Some(entry.id));
}

#[tokio::test]
async fn test_purchase_invoice_mirrors_signs() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(TradeSide::Purchase, "FP1", date(3, 1), &[(2, 25, Some("IVA10"))])
        .await;

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4000000007", 0, 55),
            movement("4720000000", 5, 0),
            movement("6000000000", 50, 0),
        ]
    );
}

#[tokio::test]
async fn test_goods_grouped_per_subaccount() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(
            TradeSide::Sale,
            "FA2",
            date(4, 2),
            &[(1, 100, Some("IVA21")), (3, 10, Some("IVA10"))],
        )
        .await;

    let entry = fx.account(&mut doc).await.unwrap();
    let movements = fx.movements(entry.id).await;
    let goods: Vec<_> = movements.iter().filter(|m| m.0.starts_with("700")).collect();
    assert_eq!(goods.len(), 1);
    assert_eq!(goods[0].2, money(130));
    assert_eq!(movements[0], movement("4300000001", 154, 0));
}

#[tokio::test]
async fn test_double_accounting_is_rejected() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(TradeSide::Sale, "FA3", date(5, 5), &[(1, 100, Some("IVA21"))])
        .await;
    let mut stale = doc.clone();

    fx.account(&mut doc).await.unwrap();
    let err = fx.account(&mut doc).await.unwrap_err();
    assert_eq!(err.key(), keys::ACCOUNTING_ENTRY_ALREADY_GENERATED);

    // A copy loaded before the entry existed is caught by the stored flag.
    let err = fx.account(&mut stale).await.unwrap_err();
    assert_eq!(err.key(), keys::ACCOUNTING_ENTRY_ALREADY_GENERATED);
    assert!(stale.accounting_entry_id.is_none());
    assert_eq!(fx.entry_count().await, 1);
}

#[tokio::test]
async fn test_missing_special_account_leaves_nothing_behind() {
    let mut fx = Fixture::new().await;
    {
        let mut conn = fx.db.acquire().await.unwrap();
        sqlx::query("DELETE FROM subaccounts WHERE account_code = '554'")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("DELETE FROM accounts WHERE code = '554'")
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    let mut doc = Document::new("", TradeSide::Sale, DocumentKind::Invoice, "FA4", date(6, 1));
    doc.series_code = "A".to_string();
    doc.subject_code = common::CUSTOMER.to_string();
    let mut supplied = line(1, 30, None);
    supplied.supplied = true;
    let mut lines = vec![line(1, 100, Some("IVA21")), supplied];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total, money(151));

    let err = fx.account(&mut doc).await.unwrap_err();
    assert_eq!(err.key(), keys::SUPPLIED_ACCOUNT_NOT_FOUND);
    assert!(err.is_configuration());
    assert!(fx.ctx.messages().contains(keys::SUPPLIED_ACCOUNT_NOT_FOUND));
    assert!(doc.accounting_entry_id.is_none());
    assert_eq!(fx.entry_count().await, 0);
}

#[tokio::test]
async fn test_stale_total_is_unbalanced() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(TradeSide::Sale, "FA5", date(6, 2), &[(1, 100, Some("IVA21"))])
        .await;
    doc.total += Money::from_units(1);

    let err = fx.account(&mut doc).await.unwrap_err();
    assert_eq!(err.key(), keys::UNBALANCED_ENTRY);
    assert_eq!(fx.entry_count().await, 0);
    assert!(fx.ctx.messages().contains(keys::UNBALANCED_ENTRY));
}

#[tokio::test]
async fn test_zero_total_invoice_is_not_accounted() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(TradeSide::Sale, "FA6", date(6, 3), &[(1, 0, Some("IVA21"))])
        .await;

    let err = fx.account(&mut doc).await.unwrap_err();
    assert_eq!(err.key(), keys::DOCUMENT_TOTAL_IS_ZERO);
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_intra_community_purchase_self_assesses_vat() {
    let mut fx = Fixture::new().await;
    let mut doc = Document::new("", TradeSide::Purchase, DocumentKind::Invoice, "FP2", date(7, 1));
    doc.series_code = "A".to_string();
    doc.subject_code = common::SUPPLIER.to_string();
    doc.operation = Operation::IntraCommunity;
    let mut lines = vec![line(1, 100, Some("IVA21"))];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total, money(100));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4000000007", 0, 100),
            movement("4720000000", 21, 0),
            movement("4770000000", 0, 21),
            movement("6000000000", 100, 0),
        ]
    );
}

#[tokio::test]
async fn test_credit_note_posts_to_returns() {
    let mut fx = Fixture::new().await;
    let original = fx
        .invoice(TradeSide::Sale, "FA7", date(8, 1), &[(1, 100, Some("IVA21"))])
        .await;

    let mut note = Document::new("", TradeSide::Sale, DocumentKind::Invoice, "R1", date(8, 15));
    note.series_code = "R".to_string();
    note.subject_code = common::CUSTOMER.to_string();
    note.rectified_id = Some(original.id.clone());
    let mut lines = vec![line(-1, 100, Some("IVA21"))];
    fx.save(&mut note, &mut lines).await;
    assert_eq!(note.total, money(-121));

    let entry = fx.account(&mut note).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4300000001", 0, 121),
            movement("4770000000", 21, 0),
            movement("7080000000", 100, 0),
        ]
    );
}

#[tokio::test]
async fn test_invoice_outside_any_period() {
    let mut fx = Fixture::new().await;
    let mut doc = fx
        .invoice(
            TradeSide::Sale,
            "FA8",
            chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            &[(1, 100, Some("IVA21"))],
        )
        .await;

    let err = fx.account(&mut doc).await.unwrap_err();
    assert_eq!(err.key(), keys::PERIOD_NOT_FOUND);
    assert_eq!(fx.entry_count().await, 0);
}

#[tokio::test]
async fn test_purchase_withholding_is_credited() {
    let mut fx = Fixture::new().await;
    let mut doc = document(TradeSide::Purchase, "FP3", date(9, 1));
    let mut professional = line(1, 100, Some("IVA21"));
    professional.withholding = dec!(15);
    let mut lines = vec![professional];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total_withholding, money(15));
    assert_eq!(doc.total, money(106));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(entry.amount, money(121));
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4000000007", 0, 106),
            movement("4720000000", 21, 0),
            movement("4751000000", 0, 15),
            movement("6000000000", 100, 0),
        ]
    );
    let withholding = &fx.lines(entry.id).await[2];
    assert_eq!(withholding.counterpart.as_deref(), Some("4000000007"));
}

#[tokio::test]
async fn test_sale_withholding_is_debited() {
    let mut fx = Fixture::new().await;
    let mut doc = document(TradeSide::Sale, "FA10", date(9, 2));
    let mut service = line(2, 100, Some("IVA21"));
    service.withholding = dec!(7);
    let mut lines = vec![service];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total, money(228));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4300000001", 228, 0),
            movement("4770000000", 0, 42),
            movement("4730000000", 14, 0),
            movement("7000000000", 0, 200),
        ]
    );
}

#[tokio::test]
async fn test_equivalence_surcharge_posted_apart_from_vat() {
    let mut fx = Fixture::new().await;
    let mut retailer = subject(TradeSide::Sale, "2");
    retailer.tax_regime = TaxRegime::EquivalenceSurcharge;
    fx.save_subject(&retailer).await;

    let mut doc = document(TradeSide::Sale, "FA11", date(9, 3));
    doc.subject_code = "2".to_string();
    let mut lines = vec![line(1, 100, Some("IVA21"))];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total_surcharge, Money::new(dec!(5.20)));
    assert_eq!(doc.total, Money::new(dec!(126.20)));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            ("4300000002".to_string(), Money::new(dec!(126.20)), Money::ZERO),
            movement("4770000000", 0, 21),
            ("4770000001".to_string(), Money::ZERO, Money::new(dec!(5.20))),
            movement("7000000000", 0, 100),
        ]
    );

    let surcharge = &fx.lines(entry.id).await[2];
    assert_eq!(surcharge.tax_base, Some(money(100)));
    assert_eq!(surcharge.surcharge, Some(dec!(5.2)));
}

#[tokio::test]
async fn test_supplied_line_credits_supplied_account() {
    let mut fx = Fixture::new().await;
    let mut doc = document(TradeSide::Sale, "FA12", date(9, 4));
    let mut supplied = line(1, 30, Some("IVA21"));
    supplied.supplied = true;
    let mut lines = vec![line(1, 100, Some("IVA21")), supplied];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.total_supplied, money(30));
    assert_eq!(doc.total, money(151));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            movement("4300000001", 151, 0),
            movement("4770000000", 0, 21),
            movement("5540000000", 0, 30),
            movement("7000000000", 0, 100),
        ]
    );
}

#[tokio::test]
async fn test_used_goods_sale_taxes_the_margin_only() {
    let mut fx = Fixture::new().await;
    let mut dealer_customer = subject(TradeSide::Sale, "3");
    dealer_customer.tax_regime = TaxRegime::UsedGoods;
    fx.save_subject(&dealer_customer).await;

    let mut doc = document(TradeSide::Sale, "FA13", date(9, 5));
    doc.subject_code = "3".to_string();
    let mut car = line(1, 150, Some("IVA21"));
    car.cost = money(100);
    let mut lines = vec![car];
    fx.save(&mut doc, &mut lines).await;
    assert_eq!(doc.net, money(150));
    assert_eq!(doc.total_tax, Money::new(dec!(10.50)));
    assert_eq!(doc.total, Money::new(dec!(160.50)));

    let entry = fx.account(&mut doc).await.unwrap();
    assert_eq!(
        fx.movements(entry.id).await,
        vec![
            ("4300000003".to_string(), Money::new(dec!(160.50)), Money::ZERO),
            ("4770000000".to_string(), Money::ZERO, Money::new(dec!(10.50))),
            movement("7000000000", 0, 150),
        ]
    );
    let vat = &fx.lines(entry.id).await[1];
    assert_eq!(vat.tax_base, Some(money(50)));
}
