mod common;

use std::collections::HashSet;

use common::wallet::unlocked_memory_wallet;
use wots_vault::WalletError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_issuers_never_share_an_index() -> anyhow::Result<()> {
    const TASKS: usize = 8;
    const ISSUES_PER_TASK: usize = 10;

    let (mut wallet, _) = unlocked_memory_wallet().await?;
    let tag = wallet.create_account(None).await?.tag;

    let handles = (0..TASKS)
        .map(|_| {
            let wallet = wallet.clone();
            tokio::spawn(async move {
                let mut issued = vec![];
                for _ in 0..ISSUES_PER_TASK {
                    let keypair = wallet.issue_wots_keypair(&tag, true).await?;
                    issued.push((keypair.wots_index().value(), keypair.address().clone()));
                }
                Ok::<_, WalletError>(issued)
            })
        })
        .collect::<Vec<_>>();

    let mut indices = HashSet::new();
    let mut addresses = HashSet::new();
    for handle in handles {
        for (index, address) in handle.await?? {
            assert!(indices.insert(index), "index {index} issued twice");
            assert!(addresses.insert(address));
        }
    }

    let total = (TASKS * ISSUES_PER_TASK) as i64;
    assert_eq!((-1..total - 1).collect::<HashSet<_>>(), indices);
    assert_eq!(total - 1, wallet.account(&tag).await?.wots_index.value());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accounts_issue_independently() -> anyhow::Result<()> {
    let (mut wallet, _) = unlocked_memory_wallet().await?;
    let mut tags = vec![];
    for _ in 0..4 {
        tags.push(wallet.create_account(None).await?.tag);
    }

    let handles = tags
        .iter()
        .map(|&tag| {
            let wallet = wallet.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    wallet.issue_wots_keypair(&tag, true).await?;
                }
                Ok::<_, WalletError>(())
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.await??;
    }

    for tag in &tags {
        assert_eq!(4, wallet.account(tag).await?.wots_index.value());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locking_mid_issuance_is_clean() -> anyhow::Result<()> {
    let (mut wallet, _) = unlocked_memory_wallet().await?;
    let tag = wallet.create_account(None).await?.tag;

    let issuer = {
        let wallet = wallet.clone();
        tokio::spawn(async move {
            let mut outcomes = vec![];
            for _ in 0..20 {
                outcomes.push(wallet.issue_wots_keypair(&tag, true).await.map(|k| k.wots_index()));
                tokio::task::yield_now().await;
            }
            outcomes
        })
    };
    tokio::task::yield_now().await;
    wallet.lock().await;

    let outcomes = issuer.await?;
    let issued = outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).count();
    for outcome in &outcomes {
        match outcome {
            Ok(_) => {}
            Err(WalletError::Locked) | Err(WalletError::AccountNotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // whatever was issued before the lock is durable
    wallet.unlock(common::wallet::PASSWORD).await?;
    assert_eq!(issued as i64 - 1, wallet.account(&tag).await?.wots_index.value());
    Ok(())
}
