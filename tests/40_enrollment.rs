mod common;

use anyhow::Result;
use edufocus_api::database::models::{NewEmployee, NewStudent};
use edufocus_api::directory::DirectoryError;
use edufocus_api::services::school_service::{insert_student, list_students};
use edufocus_api::services::{EnrollmentService, ServiceError};
use edufocus_api::types::Role;

fn student(name: &str, parent_email: Option<&str>) -> NewStudent {
    NewStudent {
        name: name.to_string(),
        parent_email: parent_email.map(str::to_string),
        ..Default::default()
    }
}

async fn guardian_links(store: &mut edufocus_api::database::TenantStore, student_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM student_guardians WHERE student_id = ?1")
        .bind(student_id)
        .fetch_one(store.conn())
        .await?;
    Ok(count)
}

#[tokio::test]
async fn enrolling_creates_guardian_and_link() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "Escola").await?;
    let enrollment = EnrollmentService::new(env.directory.clone());

    let mut store = env.databases.resolve(1).await?;
    let enrolled = enrollment
        .enroll_student(&mut store, student("Lucas", Some("Pai@Familia.com")))
        .await?;

    assert_eq!(enrolled.student.class_name.as_deref(), Some("Sem turma"));
    assert_eq!(enrolled.student.parent_email.as_deref(), Some("pai@familia.com"));
    let guardian = enrolled.guardian.expect("guardian linked");
    assert!(guardian.guardian_created);
    assert!(guardian.link_created);
    assert_eq!(guardian_links(&mut store, enrolled.student.id).await?, 1);

    let principal = env.directory.find_principal_by_email("pai@familia.com").await?.unwrap();
    assert_eq!(principal.id, guardian.guardian_id);
    assert_eq!(principal.name.as_deref(), Some("Responsável de Lucas"));
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn relinking_repairs_only_the_missing_step() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "Escola").await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    // Step 1 finished in the directory but the link was never written
    let (account, _) = env
        .directory
        .find_or_create_guardian("mae@familia.com", Some("Maria"), None, Role::Guardian)
        .await?;
    let created = insert_student(&mut store, &student("Bia", None)).await?;

    let repaired = enrollment
        .link_guardian(&mut store, created.id, "mae@familia.com", None, None)
        .await?;
    assert_eq!(repaired.guardian_id, account.id);
    assert!(!repaired.guardian_created);
    assert!(repaired.link_created);

    let repeat = enrollment
        .link_guardian(&mut store, created.id, "mae@familia.com", None, None)
        .await?;
    assert!(!repeat.guardian_created);
    assert!(!repeat.link_created);
    assert_eq!(guardian_links(&mut store, created.id).await?, 1);
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn one_guardian_spans_schools() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "A").await?;
    env.school(2, "B").await?;
    let enrollment = EnrollmentService::new(env.directory.clone());

    let mut a = env.databases.resolve(1).await?;
    let first = enrollment.enroll_student(&mut a, student("Ana", Some("mae@familia.com"))).await?;
    a.close().await?;

    let mut b = env.databases.resolve(2).await?;
    let second = enrollment.enroll_student(&mut b, student("Rui", Some("mae@familia.com"))).await?;
    b.close().await?;

    let first = first.guardian.unwrap();
    let second = second.guardian.unwrap();
    assert_eq!(first.guardian_id, second.guardian_id);
    assert!(first.guardian_created);
    assert!(!second.guardian_created);
    Ok(())
}

#[tokio::test]
async fn linking_unknown_student_fails_before_touching_directory() -> Result<()> {
    let env = common::setup().await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    let err = enrollment
        .link_guardian(&mut store, 999, "ninguem@familia.com", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Directory(DirectoryError::NotFound(_))));
    assert!(env.directory.find_principal_by_email("ninguem@familia.com").await?.is_none());
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn students_without_parent_email_skip_the_saga() -> Result<()> {
    let env = common::setup().await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    let enrolled = enrollment.enroll_student(&mut store, student("Sol", None)).await?;
    assert!(enrolled.guardian.is_none());
    assert_eq!(list_students(&mut store).await?.len(), 1);
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn employees_get_a_directory_account_once() -> Result<()> {
    let env = common::setup().await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    let employee = NewEmployee {
        name: "João".to_string(),
        role: Some("Porteiro".to_string()),
        email: Some("Joao@Escola.com".to_string()),
        phone: None,
    };

    let first = enrollment.add_employee(&mut store, employee.clone()).await?;
    assert!(first.account_created);
    assert!(first.employee.guardian_id.is_some());

    let retry = enrollment.add_employee(&mut store, employee).await?;
    assert!(!retry.account_created);
    assert_eq!(retry.employee.id, first.employee.id);
    assert_eq!(retry.employee.guardian_id, first.employee.guardian_id);

    let principal = env.directory.find_principal_by_email("joao@escola.com").await?.unwrap();
    assert_eq!(principal.role, Role::Employee);
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn rejected_parent_email_leaves_no_student_behind() -> Result<()> {
    let env = common::setup().await?;
    let school = env.school(1, "Escola").await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    // The school's own login cannot double as a guardian account
    for _ in 0..2 {
        let err = enrollment
            .enroll_student(&mut store, student("Lia", Some(school.email.as_str())))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Directory(DirectoryError::EmailTaken { role: Role::SchoolAdmin, .. })),
            "got {err:?}"
        );
    }
    assert!(list_students(&mut store).await?.is_empty());

    // A valid email on retry enrolls exactly once
    enrollment
        .enroll_student(&mut store, student("Lia", Some("mae@familia.com")))
        .await?;
    assert_eq!(list_students(&mut store).await?.len(), 1);
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn hiring_a_guardian_promotes_the_account_to_employee() -> Result<()> {
    let env = common::setup().await?;
    env.school(1, "Escola").await?;
    let enrollment = EnrollmentService::new(env.directory.clone());
    let mut store = env.databases.resolve(1).await?;

    let enrolled = enrollment
        .enroll_student(&mut store, student("Bia", Some("mae@familia.com")))
        .await?;
    let guardian_id = enrolled.guardian.unwrap().guardian_id;
    let before = env.directory.find_principal_by_email("mae@familia.com").await?.unwrap();
    assert_eq!(before.role, Role::Guardian);

    let hired = enrollment
        .add_employee(
            &mut store,
            NewEmployee {
                name: "Maria".to_string(),
                role: Some("Merendeira".to_string()),
                email: Some("mae@familia.com".to_string()),
                phone: None,
            },
        )
        .await?;
    assert!(!hired.account_created);
    assert_eq!(hired.employee.guardian_id, Some(guardian_id));

    let after = env.directory.find_principal_by_email("mae@familia.com").await?.unwrap();
    assert_eq!(after.id, guardian_id);
    assert_eq!(after.role, Role::Employee);

    // Enrolling another child later does not demote the employee
    enrollment
        .enroll_student(&mut store, student("Caio", Some("mae@familia.com")))
        .await?;
    let still = env.directory.find_principal_by_email("mae@familia.com").await?.unwrap();
    assert_eq!(still.role, Role::Employee);
    store.close().await?;
    Ok(())
}
