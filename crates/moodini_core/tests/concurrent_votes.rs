use moodini_core::{
    Answer, MemoryController, PersistenceController, Question, QuestionService, SqliteController,
    User,
};
use std::collections::HashSet;
use std::thread;

const THREADS: usize = 8;
const VOTES_PER_THREAD: usize = 25;

fn hammer_votes<C: PersistenceController>(service: &QuestionService<C>) {
    let owner = User::new(1);
    let created = service
        .create(&owner, Question::new("Mood today?", ["good", "bad"]))
        .unwrap();
    let question_id = created.question_id.unwrap();
    let good = Answer::from("good");
    let bad = Answer::from("bad");

    let returned_counts: Vec<i64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let good = &good;
                let bad = &bad;
                scope.spawn(move || {
                    let mut good_counts = Vec::new();
                    for vote in 0..VOTES_PER_THREAD {
                        if vote % 5 == 0 {
                            service.vote(question_id, bad).unwrap();
                        } else {
                            good_counts.push(service.vote(question_id, good).unwrap());
                        }
                        if worker % 2 == 0 {
                            let snapshot_total = service.results(question_id).unwrap().total();
                            assert!(snapshot_total >= 1);
                        }
                    }
                    good_counts
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    let expected_bad = (THREADS * VOTES_PER_THREAD.div_ceil(5)) as i64;
    let expected_good = (THREADS * VOTES_PER_THREAD) as i64 - expected_bad;

    let tally = service.results(question_id).unwrap();
    assert_eq!(tally.count(&good), expected_good);
    assert_eq!(tally.count(&bad), expected_bad);
    assert_eq!(tally.total(), (THREADS * VOTES_PER_THREAD) as i64);

    // Serialized writers hand out every intermediate count exactly once.
    let unique: HashSet<_> = returned_counts.iter().copied().collect();
    assert_eq!(unique.len(), returned_counts.len());
    assert_eq!(unique, (1..=expected_good).collect::<HashSet<_>>());
}

#[test]
fn concurrent_votes_are_never_lost_in_memory() {
    let service = QuestionService::new(MemoryController::new());
    hammer_votes(&service);
}

#[test]
fn concurrent_votes_are_never_lost_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let controller = SqliteController::open(dir.path().join("votes.db"), 3).unwrap();
    let service = QuestionService::new(controller);
    hammer_votes(&service);
}

#[test]
fn concurrent_creates_get_unique_ids() {
    let service = QuestionService::new(MemoryController::new());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let service = &service;
            scope.spawn(move || {
                let user = User::new(worker as i64);
                for index in 0..10 {
                    service
                        .create(&user, Question::new(format!("Q{worker}-{index}?"), ["y"]))
                        .unwrap();
                }
            });
        }
    });

    let all = service.read_all().unwrap();
    let ids: HashSet<_> = all.iter().filter_map(|question| question.question_id).collect();
    assert_eq!(all.len(), THREADS * 10);
    assert_eq!(ids.len(), THREADS * 10);
    assert!(all
        .windows(2)
        .all(|pair| pair[0].question_id < pair[1].question_id));
}
