//! Two clients writing from the same snapshot.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::ScriptedStore;
use squares_pool_state::state::{CellKey, Claimant, CreateGame, GameManager};

/// A host, client A for player p1 and client B acting for p2, with p2
/// already holding cell (0, 0).
async fn table(store: &Arc<ScriptedStore>) -> (GameManager, Arc<GameManager>, Arc<GameManager>) {
    let host = GameManager::new(store.clone());
    let code = host
        .create_game(CreateGame::new("host", "Hank"))
        .await
        .unwrap();

    let a = Arc::new(GameManager::new(store.clone()));
    let b = Arc::new(GameManager::new(store.clone()));
    a.join_game(&code, None).await.unwrap();
    b.join_game(&code, None).await.unwrap();
    b.claim_square(0, 0, &Claimant::new("p2", "Bob"))
        .await
        .unwrap();
    assert_eq!(a.players().len(), 1);

    (host, a, b)
}

#[tokio::test]
async fn test_sequential_writes_both_land() {
    let store = ScriptedStore::new();
    let (host, a, b) = table(&store).await;

    a.claim_square(1, 1, &Claimant::new("p1", "Alice"))
        .await
        .unwrap();
    b.toggle_paid("p2").await.unwrap();

    let game = host.active_game().unwrap();
    assert_eq!(game.owner(CellKey::new(1, 1)), Some("p1"));
    assert_eq!(game.player("p1").map(|p| p.squares), Some(1));
    assert_eq!(game.player("p2").map(|p| p.paid), Some(true));
}

#[tokio::test]
async fn test_overlapping_writes_later_players_group_wins() {
    let store = ScriptedStore::new();
    let (host, a, b) = table(&store).await;
    store.gate_updates(true);

    let claim = tokio::spawn({
        let a = Arc::clone(&a);
        async move { a.claim_square(1, 1, &Claimant::new("p1", "Alice")).await }
    });
    let toggle = tokio::spawn({
        let b = Arc::clone(&b);
        async move { b.toggle_paid("p2").await }
    });
    store.wait_parked(2).await;

    // Toggle lands first, then the claim overwrites players from the
    // older snapshot.
    store.release(&["players"]);
    toggle.await.unwrap().unwrap();
    assert_eq!(host.active_game().unwrap().player("p2").map(|p| p.paid), Some(true));

    store.release(&["players", "squares"]);
    claim.await.unwrap().unwrap();

    let game = host.active_game().unwrap();
    assert_eq!(game.owner(CellKey::new(1, 1)), Some("p1"));
    assert_eq!(game.player("p1").map(|p| p.squares), Some(1));
    assert_eq!(game.player("p2").map(|p| p.paid), Some(false));
}

#[tokio::test]
async fn test_overlapping_writes_later_toggle_drops_claimant() {
    let store = ScriptedStore::new();
    let (host, a, b) = table(&store).await;
    store.gate_updates(true);

    let claim = tokio::spawn({
        let a = Arc::clone(&a);
        async move { a.claim_square(1, 1, &Claimant::new("p1", "Alice")).await }
    });
    let toggle = tokio::spawn({
        let b = Arc::clone(&b);
        async move { b.toggle_paid("p2").await }
    });
    store.wait_parked(2).await;

    store.release(&["players", "squares"]);
    claim.await.unwrap().unwrap();
    store.release(&["players"]);
    toggle.await.unwrap().unwrap();

    // The squares group still holds p1's cell; the players group does not
    // list p1.
    let game = host.active_game().unwrap();
    assert_eq!(game.owner(CellKey::new(1, 1)), Some("p1"));
    assert_eq!(game.player("p1"), None);
    assert_eq!(game.players.len(), 1);
    assert_eq!(game.player("p2").map(|p| p.paid), Some(true));

    // Every client converges on the stored document.
    assert_eq!(a.active_game(), Some(game.clone()));
    assert_eq!(b.active_game(), Some(game));
}

#[tokio::test]
async fn test_disjoint_groups_both_survive() {
    let store = ScriptedStore::new();
    let (host, a, b) = table(&store).await;
    store.gate_updates(true);

    let scores = tokio::spawn({
        let a = Arc::clone(&a);
        async move { a.update_scores(21, 17).await }
    });
    let toggle = tokio::spawn({
        let b = Arc::clone(&b);
        async move { b.toggle_paid("p2").await }
    });
    store.wait_parked(2).await;

    store.release(&["scores"]);
    scores.await.unwrap().unwrap();
    store.release(&["players"]);
    toggle.await.unwrap().unwrap();

    let game = host.active_game().unwrap();
    assert_eq!((game.scores.team_a, game.scores.team_b), (21, 17));
    assert_eq!(game.player("p2").map(|p| p.paid), Some(true));
}
