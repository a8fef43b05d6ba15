mod common;

use anyhow::Result;
use edufocus_api::access::{has_access, resolve_accessible_tenant, AccessError};
use edufocus_api::database::models::{LinkStatus, Relationship};
use edufocus_api::directory::DirectoryError;

#[tokio::test]
async fn claimed_token_links_schools_both_ways() -> Result<()> {
    let env = common::setup().await?;
    let parent = env.school(20, "Escola Central").await?;
    let affiliate = env.school(21, "Escola Filial").await?;
    let outsider = env.school(22, "Escola Vizinha").await?;

    let issued = env.directory.issue_token(parent.id, "OO59GPTEB6P1").await?;
    assert_eq!(issued.status, LinkStatus::Pending);
    assert_eq!(issued.affiliate_tenant_id, None);

    let link = env.directory.claim_token("OO59GPTEB6P1", affiliate.id).await?;
    assert_eq!(link.status, LinkStatus::Active);
    assert_eq!(link.parent_tenant_id, 20);
    assert_eq!(link.affiliate_tenant_id, Some(21));

    assert!(has_access(&env.directory, 21, 20).await?);
    assert!(has_access(&env.directory, 20, 21).await?);

    let granted = resolve_accessible_tenant(&env.directory, &env.admin_of(&affiliate), Some(20)).await?;
    assert_eq!(granted, 20);

    match resolve_accessible_tenant(&env.directory, &env.admin_of(&outsider), Some(20)).await {
        Err(AccessError::Forbidden { home, requested }) => assert_eq!((home, requested), (22, 20)),
        other => panic!("expected Forbidden, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unlinked_schools_cannot_see_each_other() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;

    assert!(!has_access(&env.directory, 1, 2).await?);
    assert!(!has_access(&env.directory, 2, 1).await?);
    assert!(has_access(&env.directory, 1, 1).await?);
    Ok(())
}

#[tokio::test]
async fn pending_token_grants_nothing() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;

    env.directory.create_affiliate_token(1).await?;
    assert!(!has_access(&env.directory, 1, 2).await?);
    Ok(())
}

#[tokio::test]
async fn token_can_only_be_claimed_once() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;
    env.school(3, "C").await?;

    let link = env.directory.create_affiliate_token(1).await?;
    env.directory.claim_token(&link.token, 2).await?;

    let err = env.directory.claim_token(&link.token, 3).await.unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyUsed), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn issuer_cannot_claim_its_own_token() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;

    let link = env.directory.create_affiliate_token(1).await?;
    let err = env.directory.claim_token(&link.token, 1).await.unwrap_err();
    assert!(matches!(err, DirectoryError::SelfLink(1)), "got {err:?}");

    // The failed claim leaves the token usable
    let still = env.directory.find_link_by_token(&link.token).await?.unwrap();
    assert_eq!(still.status, LinkStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn unknown_token_is_not_found() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;

    let err = env.directory.claim_token("ZZZZZZZZZZZZ", 1).await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn typed_tokens_are_normalized_before_lookup() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;

    env.directory.issue_token(1, "ABCDEF123456").await?;
    let link = env.directory.claim_token("  abcdef123456 ", 2).await?;
    assert_eq!(link.status, LinkStatus::Active);
    Ok(())
}

#[tokio::test]
async fn second_link_in_either_direction_is_refused() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;

    let first = env.directory.create_affiliate_token(1).await?;
    env.directory.claim_token(&first.token, 2).await?;

    // Same direction
    let again = env.directory.create_affiliate_token(1).await?;
    let err = env.directory.claim_token(&again.token, 2).await.unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyLinked(1, 2)), "got {err:?}");

    // Reverse direction
    let reverse = env.directory.create_affiliate_token(2).await?;
    let err = env.directory.claim_token(&reverse.token, 1).await.unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyLinked(2, 1)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn revoking_ends_access_and_burns_the_token() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;
    env.school(3, "C").await?;

    let link = env.directory.create_affiliate_token(1).await?;
    let link = env.directory.claim_token(&link.token, 2).await?;

    // The affiliate side may revoke too
    let removed = env.directory.revoke_link(link.id, 2).await?;
    assert_eq!(removed.status, LinkStatus::Removed);
    assert!(!has_access(&env.directory, 2, 1).await?);
    assert!(!has_access(&env.directory, 1, 2).await?);

    let err = env.directory.claim_token(&link.token, 3).await.unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyUsed), "got {err:?}");

    // Repeating the revoke is harmless
    let again = env.directory.revoke_link(link.id, 1).await?;
    assert_eq!(again.status, LinkStatus::Removed);

    // A fresh token can relink the pair
    let fresh = env.directory.create_affiliate_token(1).await?;
    env.directory.claim_token(&fresh.token, 2).await?;
    assert!(has_access(&env.directory, 2, 1).await?);
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_revoke() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;
    env.school(3, "C").await?;

    let link = env.directory.create_affiliate_token(1).await?;
    let link = env.directory.claim_token(&link.token, 2).await?;

    let err = env.directory.revoke_link(link.id, 3).await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)), "got {err:?}");
    assert!(has_access(&env.directory, 1, 2).await?);
    Ok(())
}

#[tokio::test]
async fn links_are_listed_from_both_sides() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "Matriz").await?;
    env.school(2, "Filial Norte").await?;
    env.school(3, "Filial Sul").await?;

    for affiliate in [2, 3] {
        let link = env.directory.create_affiliate_token(1).await?;
        env.directory.claim_token(&link.token, affiliate).await?;
    }

    let parent_view = env.directory.list_links(1).await?;
    let names: Vec<&str> = parent_view.as_parent.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Filial Norte", "Filial Sul"]);
    assert!(parent_view.as_affiliate.is_empty());
    assert!(parent_view.as_parent.iter().all(|s| s.relationship == Relationship::Affiliate));

    let affiliate_view = env.directory.list_links(3).await?;
    assert_eq!(affiliate_view.as_affiliate.len(), 1);
    assert_eq!(affiliate_view.as_affiliate[0].school_id, 1);
    assert_eq!(affiliate_view.as_affiliate[0].relationship, Relationship::Parent);
    Ok(())
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;
    env.school(3, "C").await?;

    let link = env.directory.create_affiliate_token(1).await?;
    let (a, b) = tokio::join!(
        env.directory.claim_token(&link.token, 2),
        env.directory.claim_token(&link.token, 3)
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(DirectoryError::AlreadyUsed)));
    Ok(())
}

#[tokio::test]
async fn seeded_tokens_must_match_the_generated_format() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;

    for bad in ["SHORT", "ABCDEF12345!", "ABCDEF1234567"] {
        let err = env.directory.issue_token(1, bad).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Invalid(_)), "{bad}: got {err:?}");
    }

    let live = env.directory.create_affiliate_token(1).await?;
    assert_eq!(live.token.len(), 12);
    assert!(live.token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    Ok(())
}
