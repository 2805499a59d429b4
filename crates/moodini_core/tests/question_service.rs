use moodini_core::{
    Answer, MemoryController, PersistenceController, Question, QuestionService,
    QuestionServiceError, SqliteController, User,
};
use std::collections::HashSet;
use tempfile::TempDir;

fn memory_service() -> QuestionService<MemoryController> {
    QuestionService::new(MemoryController::new())
}

fn sqlite_service() -> (TempDir, QuestionService<SqliteController>) {
    let dir = tempfile::tempdir().unwrap();
    let controller = SqliteController::open(dir.path().join("moodini.db"), 2).unwrap();
    (dir, QuestionService::new(controller))
}

fn favorite_color() -> Question {
    Question::new("Favorite color?", ["Red", "Blue"])
}

fn check_create_stamps_caller_as_owner<C: PersistenceController>(service: &QuestionService<C>) {
    let owner = User::new(1);
    let payload = favorite_color().with_owner(99);

    let created = service.create(&owner, payload).unwrap();

    assert_eq!(created.user_id, Some(owner.user_id));
    assert!(created.question_id.is_some());
    assert!(created.created.is_some());
    assert_eq!(created.question, "Favorite color?");
    assert_eq!(created.answers, vec![Answer::from("Red"), Answer::from("Blue")]);
}

fn check_lifecycle_example<C: PersistenceController>(service: &QuestionService<C>) {
    let u1 = User::new(1);
    let u2 = User::new(2);

    let created = service.create(&u1, favorite_color()).unwrap();
    let question_id = created.question_id.unwrap();

    let mut hijack = created.clone();
    hijack.question = "Hijacked?".to_string();
    let err = service.update(&u2, hijack).unwrap_err();
    assert!(matches!(
        err,
        QuestionServiceError::Forbidden { question_id: id, user_id: 2 } if id == question_id
    ));
    assert_eq!(service.read(question_id).unwrap(), Some(created.clone()));

    let err = service.delete(&u2, question_id).unwrap_err();
    assert!(err.is_forbidden());

    service.delete(&u1, question_id).unwrap();
    assert_eq!(service.read(question_id).unwrap(), None);
}

fn check_update_by_owner_replaces_content<C: PersistenceController>(service: &QuestionService<C>) {
    let owner = User::new(5);
    let created = service.create(&owner, favorite_color()).unwrap();

    let mut changed = created.clone();
    changed.question = "Favorite colour?".to_string();
    changed.answers = vec![Answer::from("Green"), Answer::from("Red"), Answer::from("Blue")];
    changed.user_id = Some(77);

    let updated = service.update(&owner, changed).unwrap();
    assert_eq!(updated.question_id, created.question_id);
    assert_eq!(updated.user_id, Some(owner.user_id));
    assert_eq!(updated.created, created.created);
    assert_eq!(updated.question, "Favorite colour?");
    assert_eq!(
        updated.answers,
        vec![Answer::from("Green"), Answer::from("Red"), Answer::from("Blue")]
    );
    assert_eq!(service.read(created.question_id.unwrap()).unwrap(), Some(updated));
}

fn check_unknown_id_is_not_found_before_ownership<C: PersistenceController>(
    service: &QuestionService<C>,
) {
    let stranger = User::new(3);

    let err = service
        .update(&stranger, favorite_color().with_id(404))
        .unwrap_err();
    assert!(matches!(err, QuestionServiceError::NotFound(Some(404))));

    let err = service.delete(&stranger, 404).unwrap_err();
    assert!(matches!(err, QuestionServiceError::NotFound(Some(404))));

    let err = service.vote(404, &Answer::from("Red")).unwrap_err();
    assert!(matches!(err, QuestionServiceError::NotFound(Some(404))));
}

fn check_read_all_returns_creation_order<C: PersistenceController>(service: &QuestionService<C>) {
    let user = User::new(1);
    let mut created_ids = Vec::new();
    for index in 0..5 {
        let created = service
            .create(&user, Question::new(format!("Question {index}?"), ["yes", "no"]))
            .unwrap();
        created_ids.push(created.question_id.unwrap());
    }

    let all = service.read_all().unwrap();
    let listed_ids: Vec<_> = all.iter().filter_map(|question| question.question_id).collect();
    let unique: HashSet<_> = listed_ids.iter().copied().collect();

    assert_eq!(all.len(), 5);
    assert_eq!(unique.len(), 5);
    assert_eq!(listed_ids, created_ids);
}

fn check_read_latest<C: PersistenceController>(service: &QuestionService<C>) {
    let err = service.read_latest().unwrap_err();
    assert!(matches!(err, QuestionServiceError::NotFound(None)));

    let user = User::new(1);
    service.create(&user, Question::new("First?", ["a"])).unwrap();
    let second = service.create(&user, Question::new("Second?", ["b"])).unwrap();

    assert_eq!(service.read_latest().unwrap(), second);
}

fn check_votes_are_tallied<C: PersistenceController>(service: &QuestionService<C>) {
    let owner = User::new(1);
    let created = service.create(&owner, favorite_color()).unwrap();
    let question_id = created.question_id.unwrap();
    let red = Answer::from("Red");
    let blue = Answer::from("Blue");

    assert_eq!(service.vote(question_id, &red).unwrap(), 1);
    assert_eq!(service.vote(question_id, &red).unwrap(), 2);
    assert_eq!(service.vote(question_id, &blue).unwrap(), 1);

    let tally = service.results(question_id).unwrap();
    assert_eq!(tally.question_id, question_id);
    assert_eq!(tally.count(&red), 2);
    assert_eq!(tally.count(&blue), 1);
    assert_eq!(tally.total(), 3);

    let mut changed = created;
    changed.question = "Favourite color?".to_string();
    service.update(&owner, changed).unwrap();
    assert_eq!(service.results(question_id).unwrap().total(), 3);

    service.delete(&owner, question_id).unwrap();
    assert!(service.results(question_id).unwrap_err().is_not_found());
}

fn check_health_and_shutdown<C: PersistenceController>(service: &QuestionService<C>) {
    service.create(&User::new(1), favorite_color()).unwrap();
    assert_eq!(service.health_check().unwrap().question_count, 1);

    service.shutdown().unwrap();
    service.shutdown().unwrap();
    assert!(matches!(
        service.health_check(),
        Err(QuestionServiceError::Store(_))
    ));
    assert!(matches!(
        service.create(&User::new(1), favorite_color()),
        Err(QuestionServiceError::Store(_))
    ));
}

#[test]
fn memory_create_stamps_caller_as_owner() {
    check_create_stamps_caller_as_owner(&memory_service());
}

#[test]
fn sqlite_create_stamps_caller_as_owner() {
    let (_dir, service) = sqlite_service();
    check_create_stamps_caller_as_owner(&service);
}

#[test]
fn memory_lifecycle_example() {
    check_lifecycle_example(&memory_service());
}

#[test]
fn sqlite_lifecycle_example() {
    let (_dir, service) = sqlite_service();
    check_lifecycle_example(&service);
}

#[test]
fn memory_update_by_owner_replaces_content() {
    check_update_by_owner_replaces_content(&memory_service());
}

#[test]
fn sqlite_update_by_owner_replaces_content() {
    let (_dir, service) = sqlite_service();
    check_update_by_owner_replaces_content(&service);
}

#[test]
fn memory_unknown_id_is_not_found_before_ownership() {
    check_unknown_id_is_not_found_before_ownership(&memory_service());
}

#[test]
fn sqlite_unknown_id_is_not_found_before_ownership() {
    let (_dir, service) = sqlite_service();
    check_unknown_id_is_not_found_before_ownership(&service);
}

#[test]
fn memory_read_all_returns_creation_order() {
    check_read_all_returns_creation_order(&memory_service());
}

#[test]
fn sqlite_read_all_returns_creation_order() {
    let (_dir, service) = sqlite_service();
    check_read_all_returns_creation_order(&service);
}

#[test]
fn memory_read_latest() {
    check_read_latest(&memory_service());
}

#[test]
fn sqlite_read_latest() {
    let (_dir, service) = sqlite_service();
    check_read_latest(&service);
}

#[test]
fn memory_votes_are_tallied() {
    check_votes_are_tallied(&memory_service());
}

#[test]
fn sqlite_votes_are_tallied() {
    let (_dir, service) = sqlite_service();
    check_votes_are_tallied(&service);
}

#[test]
fn memory_health_and_shutdown() {
    check_health_and_shutdown(&memory_service());
}

#[test]
fn sqlite_health_and_shutdown() {
    let (_dir, service) = sqlite_service();
    check_health_and_shutdown(&service);
}
