use super::*;

// ========================================================================
//  副作用失败 → outbox 重试 → 死信
// ========================================================================

#[tokio::test]
async fn test_failed_occupy_is_retried_by_worker() {
    let h = Harness::new(&[5]).await;
    h.store.break_writes(Collection::Tables);

    let order = h
        .manager
        .create_order(pizza_order(5, Some("555-0101")))
        .await
        .unwrap();

    // 桌台失败不影响顾客登记
    assert!(h.customer("5550101").await.is_some());
    assert!(!h.table(5).await.occupied);

    let entries = h.outbox_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, format!("{}:pending", order.id));
    assert_eq!(entries[0].effects, vec![SideEffect::OccupyTable]);
    assert_eq!(entries[0].retry_count, 1);
    assert!(entries[0].last_error.is_some());

    h.store.heal();
    let worker = h.worker(5);

    // 未到退避时间
    let scan = worker.process_pending_queue().await;
    assert_eq!(scan.skipped, 1);
    assert!(!h.table(5).await.occupied);

    h.advance_secs(5);
    let scan = worker.process_pending_queue().await;
    assert_eq!(scan.settled, 1);
    let table = h.table(5).await;
    assert!(table.occupied);
    assert_eq!(table.current_order_id.as_deref(), Some(order.id.as_str()));
    assert!(h.outbox_entries().await.is_empty());
}

#[tokio::test]
async fn test_retry_projects_current_truth() {
    let h = Harness::new(&[5]).await;
    h.store.break_writes(Collection::Tables);
    let order = h.manager.create_order(pizza_order(5, None)).await.unwrap();
    h.manager
        .update_order_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    // release 时桌台本就空闲，无需写入；只剩 occupy 待重试
    let entries = h.outbox_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, OrderStatus::Pending);

    h.store.heal();
    h.advance_secs(10);
    let scan = h.worker(5).process_pending_queue().await;
    assert_eq!(scan.settled, 1);

    // occupy 重试不会把已取消订单写回桌台
    let table = h.table(5).await;
    assert!(!table.occupied);
    assert!(table.current_order_id.is_none());
}

#[tokio::test]
async fn test_exhausted_entries_move_to_dead_letters() {
    let h = Harness::new(&[5]).await;
    h.store.break_writes(Collection::Tables);
    h.manager.create_order(pizza_order(5, None)).await.unwrap();

    let worker = h.worker(3);
    h.advance_secs(300);
    let scan = worker.process_pending_queue().await;
    assert_eq!(scan.retrying, 1);

    h.advance_secs(300);
    let scan = worker.process_pending_queue().await;
    assert_eq!(scan.dead_lettered, 1);
    assert!(h.outbox_entries().await.is_empty());

    let dead = h.outbox.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].retry_count, 3);
    assert!(dead[0].failed_at.is_some());

    // 重启恢复死信
    h.store.heal();
    assert_eq!(
        h.outbox.recover_dead_letters(h.clock.now_millis()).await.unwrap(),
        1
    );
    let scan = worker.process_pending_queue().await;
    assert_eq!(scan.settled, 1);
    assert!(h.table(5).await.occupied);
}

#[tokio::test]
async fn test_failed_completion_is_retried_once() {
    let h = Harness::new(&[5]).await;
    let order = h
        .manager
        .create_order(pizza_order(5, Some("555-0101")))
        .await
        .unwrap();
    advance_to(&h, &order.id, &[OrderStatus::Preparing, OrderStatus::Ready]).await;

    h.store.break_writes(Collection::Customers);
    advance_to(&h, &order.id, &[OrderStatus::Served]).await;
    assert!(!h.table(5).await.occupied);
    assert_eq!(h.customer("5550101").await.unwrap().total_orders, 0);

    let entries = h.outbox_entries().await;
    assert_eq!(entries[0].effects, vec![SideEffect::CompleteCustomer]);

    h.store.heal();
    h.advance_secs(5);
    let worker = h.worker(5);
    worker.process_pending_queue().await;
    h.advance_secs(600);
    worker.process_pending_queue().await;
    assert_eq!(h.customer("5550101").await.unwrap().total_orders, 1);
}

#[tokio::test]
async fn test_outbox_write_failure_still_runs_effects() {
    let h = Harness::new(&[5]).await;
    h.store.break_writes(Collection::Outbox);

    let order = h.manager.create_order(pizza_order(5, None)).await.unwrap();
    assert_eq!(
        h.table(5).await.current_order_id.as_deref(),
        Some(order.id.as_str())
    );
    h.store.heal();
    assert!(h.outbox_entries().await.is_empty());
}

#[tokio::test]
async fn test_notification_failure_is_swallowed() {
    let h = Harness::new(&[5]).await;
    h.store.break_writes(Collection::Notifications);

    let order = h.manager.create_order(pizza_order(5, None)).await.unwrap();
    advance_to(&h, &order.id, &[OrderStatus::Preparing, OrderStatus::Ready]).await;

    assert!(h.notifications().await.is_empty());
    // 通知不进入重试队列
    assert!(h.outbox_entries().await.is_empty());
}

#[tokio::test]
async fn test_entry_for_missing_order_is_dropped() {
    let h = Harness::new(&[5]).await;
    let ghost = Order {
        id: "ghost".into(),
        table_number: 5,
        customer_name: String::new(),
        customer_phone: None,
        items: Vec::new(),
        status: OrderStatus::Pending,
        total_amount: 0.0,
        notes: String::new(),
        order_source: Default::default(),
        payment_method: None,
        created_at: START,
        updated_at: START,
        status_history: Vec::new(),
    };
    h.outbox
        .enqueue(&OutboxEntry::new(&ghost, vec![SideEffect::OccupyTable], START))
        .await
        .unwrap();

    h.advance_secs(5);
    let scan = h.worker(5).process_pending_queue().await;
    assert_eq!(scan.settled, 1);
    assert!(h.outbox_entries().await.is_empty());
    assert!(!h.table(5).await.occupied);
}

// ========================================================================
//  worker 与内联副作用并发
// ========================================================================

#[tokio::test]
async fn test_scan_during_inline_effects_leaves_entry_alone() {
    let h = Harness::new(&[5]).await;
    let order = h
        .manager
        .create_order(pizza_order(5, Some("555-0101")))
        .await
        .unwrap();
    advance_to(&h, &order.id, &[OrderStatus::Preparing, OrderStatus::Ready]).await;

    // 释放桌台的写入被挂起，served 的 outbox 条目此时已存在
    h.store
        .stall_next_update(Collection::Tables, Duration::from_millis(300));
    let manager = h.manager.clone();
    let order_id = order.id.clone();
    let serving = tokio::spawn(async move {
        manager
            .update_order_status(&order_id, OrderStatus::Served)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let in_flight = h.outbox_entries().await;
    assert_eq!(in_flight.len(), 1);
    let scan = h.worker(5).process_pending_queue().await;
    assert_eq!(scan.settled, 0);
    assert_eq!(scan.skipped, 1);

    serving.await.unwrap().unwrap();
    assert_eq!(h.customer("5550101").await.unwrap().total_orders, 1);
    assert!(!h.table(5).await.occupied);
    assert!(h.outbox_entries().await.is_empty());

    // 之后的扫描也不会再次计数
    h.advance_secs(600);
    h.worker(5).process_pending_queue().await;
    assert_eq!(h.customer("5550101").await.unwrap().total_orders, 1);
}
