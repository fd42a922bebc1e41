//! End-to-end circulation scenarios driven through the services

use chrono::{Duration, Utc};
use circulation_desk::{
    error::{AppError, ErrorKind},
    models::{
        fine::{FineOutcome, PayFine, WaiveFine},
        transaction::{IssueBook, ReturnBook},
        BookState, Fine, FineStatus, ReturnCondition, ShelfPlacement, TransactionStatus,
    },
    repository::{memory::MemoryStore, CirculationStore, Repository},
    services::Services,
};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use crate::support::{backdated_loan, book, desk, shelf, test_config, user, Desk};

fn issue(book_id: Uuid, user_id: Uuid, days: i64) -> IssueBook {
    IssueBook {
        book_id,
        user_id,
        due_date: (Utc::now() + Duration::days(days)).to_rfc3339(),
    }
}

fn give_back(book_id: Uuid, user_id: Uuid, condition: &str) -> ReturnBook {
    ReturnBook {
        book_id,
        user_id,
        condition: condition.to_string(),
        notes: None,
    }
}

/// `is_available` must agree with the presence of an open transaction
async fn assert_availability_consistent(desk: &Desk, book_id: Uuid) {
    let book = desk.store.get_book(book_id).await.unwrap();
    let open = desk.store.find_open_transaction(book_id).await.unwrap();
    assert_eq!(book.is_available, open.is_none());
}

#[tokio::test]
async fn full_shelf_rejects_placement() {
    let desk = desk();
    let shelf = shelf(&desk, 1).await;
    book(&desk, &shelf).await;

    let err = desk
        .services()
        .shelves
        .place_book(shelf.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded { capacity: 1, .. }));

    let shelf = desk.store.get_shelf(shelf.id).await.unwrap();
    assert_eq!(shelf.current_books, 1);
    assert_eq!(shelf.utilization_percentage(), 100);
}

#[tokio::test]
async fn fifteen_days_late_at_five_per_day_is_seventy_five() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Priya").await;
    let loan = backdated_loan(&desk, &book, &reader, 15).await;

    let report = desk
        .services()
        .fines
        .calculate_fines(Decimal::from(5))
        .await
        .unwrap();

    assert_eq!(report.total_processed, 1);
    assert_eq!(report.fines_created, 1);
    assert_eq!(report.transactions_updated, 1);

    let fines = desk.store.fetch_fines(None).await.unwrap();
    assert_eq!(fines.len(), 1);
    let fine = &fines[0];
    assert_eq!(fine.transaction_id, loan.id);
    assert_eq!(fine.days_overdue, 15);
    assert_eq!(fine.fine_amount, Decimal::from(75));
    assert_eq!(fine.status, FineStatus::Pending);
    assert_eq!(fine.book_title, book.title);

    let overdue = desk
        .store
        .list_transactions(Some(TransactionStatus::Overdue))
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].days_overdue, Some(15));
}

#[tokio::test]
async fn fine_calculation_is_idempotent() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let reader = user(&desk, "Tomas").await;
    for days_late in [2, 9] {
        let book = book(&desk, &shelf).await;
        backdated_loan(&desk, &book, &reader, days_late).await;
    }

    let fines = &desk.services().fines;
    let first = fines.calculate_fines(Decimal::new(250, 2)).await.unwrap();
    assert_eq!(first.fines_created, 2);

    let second = fines.calculate_fines(Decimal::new(250, 2)).await.unwrap();
    assert_eq!(second.fines_created, 0);
    assert_eq!(second.transactions_updated, 0);
    assert_eq!(second.skipped, second.total_processed);
    assert!(second
        .details
        .iter()
        .all(|d| d.outcome == FineOutcome::AlreadyFined));
}

#[tokio::test]
async fn unpaid_fine_blocks_return_until_paid() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Olu").await;
    backdated_loan(&desk, &book, &reader, 4).await;

    let services = desk.services();
    services.fines.calculate_fines(Decimal::from(5)).await.unwrap();
    let fine = services.fines.pending_fines_for(book.id, reader.id).await.unwrap().remove(0);

    let err = services
        .circulation
        .return_book(give_back(book.id, reader.id, "good"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyGuard);
    match err {
        AppError::UnpaidFines { total, fines } => {
            assert_eq!(total, Decimal::from(20));
            assert_eq!(fines.len(), 1);
            assert_eq!(fines[0].id, fine.id);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_availability_consistent(&desk, book.id).await;

    let paid = services
        .fines
        .pay_fine(
            fine.id,
            PayFine {
                payment_method: "cash".into(),
                notes: Some(String::new()),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, FineStatus::Paid);
    assert!(paid.paid_at.is_some());

    let outcome = services
        .circulation
        .return_book(give_back(book.id, reader.id, "good"))
        .await
        .unwrap();
    // The paid fine already covers this transaction
    assert!(outcome.fine.is_none());
    assert_eq!(outcome.book_state, BookState::Available);
    assert_eq!(outcome.transaction.status, TransactionStatus::Returned);
    assert_availability_consistent(&desk, book.id).await;
}

#[tokio::test]
async fn waiver_requires_a_real_reason() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Mei").await;
    backdated_loan(&desk, &book, &reader, 1).await;

    let fines = &desk.services().fines;
    fines.calculate_fines(Decimal::from(5)).await.unwrap();
    let fine = fines.list_fines(None, Some(FineStatus::Pending)).await.unwrap().remove(0);

    let err = fines
        .waive_fine(
            fine.id,
            WaiveFine {
                reason: "ok".into(),
                notes: Some(String::new()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let waived = fines
        .waive_fine(
            fine.id,
            WaiveFine {
                reason: "First offense, goodwill waiver".into(),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(waived.status, FineStatus::Waived);
    assert_eq!(waived.waiver_reason.as_deref(), Some("First offense, goodwill waiver"));

    let again = fines
        .pay_fine(
            fine.id,
            PayFine {
                payment_method: "card".into(),
                notes: None,
            },
        )
        .await;
    assert!(matches!(
        again,
        Err(AppError::AlreadyProcessed { status: FineStatus::Waived, .. })
    ));
}

#[tokio::test]
async fn issue_then_return_on_time_leaves_no_fine() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Lena").await;
    let services = desk.services();

    let transaction = assert_ok!(services.circulation.issue(issue(book.id, reader.id, 14)).await);
    assert_eq!(transaction.status, TransactionStatus::Current);
    assert_eq!(
        services.circulation.book_status(None, book.id).await.unwrap(),
        BookState::Issued
    );
    assert_availability_consistent(&desk, book.id).await;

    let outcome = services
        .circulation
        .return_book(give_back(book.id, reader.id, "fair"))
        .await
        .unwrap();
    assert!(outcome.fine.is_none());
    assert_eq!(outcome.transaction.condition, Some(ReturnCondition::Fair));
    assert_availability_consistent(&desk, book.id).await;

    assert!(desk.store.fetch_fines(None).await.unwrap().is_empty());
    let history = services.circulation.user_history(None, reader.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Returned);
}

#[tokio::test]
async fn issued_book_cannot_be_issued_again() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let first = user(&desk, "Ana").await;
    let second = user(&desk, "Ben").await;
    let services = desk.services();

    assert_ok!(services.circulation.issue(issue(book.id, first.id, 7)).await);
    let err = assert_err!(services.circulation.issue(issue(book.id, second.id, 7)).await);
    assert!(matches!(err, AppError::BookNotAvailable { .. }));

    let open = desk.store.find_open_transaction(book.id).await.unwrap().unwrap();
    assert_eq!(open.user_id, first.id);
}

#[tokio::test]
async fn concurrent_issues_open_one_transaction() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let a = user(&desk, "Ana").await;
    let b = user(&desk, "Ben").await;
    let circulation = &desk.services().circulation;

    let (first, second) = tokio::join!(
        circulation.issue(issue(book.id, a.id, 7)),
        circulation.issue(issue(book.id, b.id, 7)),
    );
    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);

    let all = desk.store.list_transactions(None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_availability_consistent(&desk, book.id).await;
}

#[tokio::test]
async fn returning_twice_is_already_returned() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Kofi").await;
    let services = desk.services();

    services.circulation.issue(issue(book.id, reader.id, 3)).await.unwrap();
    services
        .circulation
        .return_book(give_back(book.id, reader.id, "good"))
        .await
        .unwrap();

    let err = services
        .circulation
        .return_book(give_back(book.id, reader.id, "good"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned { .. }));
}

#[tokio::test]
async fn only_the_borrower_can_return() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let borrower = user(&desk, "Iris").await;
    let stranger = user(&desk, "Jon").await;
    let services = desk.services();

    services.circulation.issue(issue(book.id, borrower.id, 3)).await.unwrap();
    let err = services
        .circulation
        .return_book(give_back(book.id, stranger.id, "good"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotIssuedToUser { .. }));
    assert_eq!(
        services.circulation.book_status(None, book.id).await.unwrap(),
        BookState::Issued
    );
}

#[tokio::test]
async fn late_return_is_fined_at_configured_rate() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Sam").await;
    backdated_loan(&desk, &book, &reader, 3).await;

    let history = desk.services().circulation.user_history(None, reader.id).await.unwrap();
    assert_eq!(history[0].status, TransactionStatus::Overdue);

    let outcome = desk
        .services()
        .circulation
        .return_book(give_back(book.id, reader.id, "lost"))
        .await
        .unwrap();

    let fine = outcome.fine.expect("late return should be fined");
    assert_eq!(fine.days_overdue, 3);
    assert_eq!(fine.fine_per_day, desk.state.config.circulation.fine_per_day);
    assert_eq!(fine.fine_amount, Decimal::from(15));
    assert_eq!(fine.status, FineStatus::Pending);
    assert!(desk.services().fines.has_pending_fines(book.id).await.unwrap());
}

#[tokio::test]
async fn shelf_occupancy_follows_catalog_changes() {
    let desk = desk();
    let from = shelf(&desk, 2).await;
    let to = shelf(&desk, 1).await;
    let book = book(&desk, &from).await;
    let catalog = &desk.services().catalog;
    let shelves = &desk.services().shelves;

    let err = shelves.delete_shelf(from.id).await.unwrap_err();
    assert!(matches!(err, AppError::ShelfNotEmpty { current_books: 1, .. }));
    let err = shelves.resize_capacity(from.id, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    catalog
        .move_book(
            book.id,
            ShelfPlacement {
                rack_id: to.rack_id,
                shelf_id: to.id,
            },
        )
        .await
        .unwrap();
    assert_eq!(desk.store.get_shelf(from.id).await.unwrap().current_books, 0);
    assert_eq!(desk.store.get_shelf(to.id).await.unwrap().current_books, 1);

    let extra = catalog
        .move_book(
            crate::support::book(&desk, &from).await.id,
            ShelfPlacement {
                rack_id: to.rack_id,
                shelf_id: to.id,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(extra, AppError::CapacityExceeded { .. }));

    catalog.delete_book(book.id).await.unwrap();
    assert_eq!(desk.store.get_shelf(to.id).await.unwrap().current_books, 0);
    shelves.delete_shelf(to.id).await.unwrap();
}

#[tokio::test]
async fn issued_book_cannot_be_deleted() {
    let desk = desk();
    let shelf = shelf(&desk, 3).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Noor").await;
    desk.services()
        .circulation
        .issue(issue(book.id, reader.id, 5))
        .await
        .unwrap();

    let err = desk.services().catalog.delete_book(book.id).await.unwrap_err();
    assert!(matches!(err, AppError::BookNotAvailable { .. }));
    assert_eq!(desk.store.get_shelf(shelf.id).await.unwrap().current_books, 1);
}

#[tokio::test]
async fn out_of_range_fine_rate_fails_startup() {
    for rate in [Decimal::ZERO, Decimal::from(-5), Decimal::from(1001)] {
        let mut config = test_config();
        config.circulation.fine_per_day = rate;
        let result = Services::new(Repository::memory(MemoryStore::new()), &config);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

#[tokio::test]
async fn fined_loan_missing_overdue_mark_is_repaired() {
    let desk = desk();
    let shelf = shelf(&desk, 10).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Ines").await;
    let loan = backdated_loan(&desk, &book, &reader, 4).await;

    // Fine written but the overdue mark never landed
    let fine = Fine::pending(&loan, &book, 4, Decimal::from(5), Utc::now());
    assert_ok!(desk.store.persist_fine(fine).await);

    let report = desk
        .services()
        .fines
        .calculate_fines(Decimal::from(5))
        .await
        .unwrap();
    assert_eq!(report.fines_created, 0);
    assert_eq!(report.transactions_updated, 1);
    assert_eq!(report.details[0].outcome, FineOutcome::AlreadyFined);

    let open = desk.store.find_open_transaction(book.id).await.unwrap().unwrap();
    assert_eq!(open.status, TransactionStatus::Overdue);
    assert_eq!(open.fine_amount, Some(Decimal::from(20)));

    let again = desk
        .services()
        .fines
        .calculate_fines(Decimal::from(5))
        .await
        .unwrap();
    assert_eq!(again.transactions_updated, 0);
}
