use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
};
use rocket::{form::Form, futures::TryStreamExt, response::Redirect, Route};
use rocket_dyn_templates::{context, Template};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        question::{QuestionDescription, QuestionSummary},
        vote::VoteForm,
    },
    common::QuestionId,
    db::question::{Question, VoteOutcome},
    mongodb::{question_id_filter, Coll},
};

/// The listing shows at most this many questions.
pub const LATEST_QUESTIONS_LIMIT: i64 = 5;

/// Shown above the voting form when a vote could not be matched to a choice.
pub const NO_CHOICE_MESSAGE: &str = "You didn't select a choice.";

pub fn routes() -> Vec<Route> {
    routes![root, index, detail, results, vote]
}

#[get("/")]
fn root() -> Redirect {
    Redirect::to(uri!(index))
}

#[get("/polls")]
async fn index(questions: Coll<Question>) -> Result<Template> {
    let latest = latest_questions(&questions, Utc::now()).await?;
    Ok(Template::render(
        "polls/index",
        context! { latest_question_list: latest },
    ))
}

#[get("/polls/<question_id>")]
async fn detail(question_id: QuestionId, questions: Coll<Question>) -> Result<Template> {
    let question = question_by_id(question_id, &questions).await?;
    Ok(detail_page(question, None))
}

#[get("/polls/<question_id>/results")]
async fn results(question_id: QuestionId, questions: Coll<Question>) -> Result<Template> {
    let question = question_by_id(question_id, &questions).await?;
    Ok(Template::render(
        "polls/results",
        context! { question: QuestionDescription::from(question) },
    ))
}

/// Either somewhere to go next, or the form again.
#[derive(Responder)]
enum VoteResponse {
    Recorded(Redirect),
    Retry(Template),
}

#[post("/polls/<question_id>/vote", data = "<ballot>")]
async fn vote(
    question_id: QuestionId,
    ballot: Option<Form<VoteForm<'_>>>,
    questions: Coll<Question>,
) -> Result<VoteResponse> {
    let question = question_by_id(question_id, &questions).await?;

    // A request without a form body selects nothing.
    let choice_id = ballot.as_ref().and_then(|ballot| ballot.choice_id());
    match Question::record_vote(&questions, question.id, choice_id).await? {
        VoteOutcome::Recorded(choice) => {
            info!(
                "Recorded vote for choice {} of question {question_id}, now {}",
                choice.id, choice.votes
            );
            // Redirect so that reloading the landing page cannot vote again.
            Ok(VoteResponse::Recorded(Redirect::to(uri!(results(
                question_id
            )))))
        }
        VoteOutcome::InvalidSelection => {
            debug!(
                "Invalid selection {:?} for question {question_id}",
                ballot.as_ref().and_then(|ballot| ballot.choice)
            );
            Ok(VoteResponse::Retry(detail_page(
                question,
                Some(NO_CHOICE_MESSAGE),
            )))
        }
    }
}

/// The voting form for `question`, optionally with an error above it.
fn detail_page(question: Question, error_message: Option<&str>) -> Template {
    Template::render(
        "polls/detail",
        context! {
            question: QuestionDescription::from(question),
            error_message,
        },
    )
}

async fn question_by_id(question_id: QuestionId, questions: &Coll<Question>) -> Result<Question> {
    questions
        .find_one(question_id_filter(question_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question with ID '{question_id}'")))
}

/// The most recently published questions as of `now`, newest first.
/// Questions due to be published after `now` are left out.
async fn latest_questions(
    questions: &Coll<Question>,
    now: DateTime<Utc>,
) -> Result<Vec<QuestionSummary>> {
    let filter = doc! {
        "pub_date": { "$lte": bson::DateTime::from_chrono(now) },
    };
    let options = FindOptions::builder()
        .sort(doc! {"pub_date": -1, "_id": -1})
        .limit(LATEST_QUESTIONS_LIMIT)
        .build();

    let latest: Vec<QuestionSummary> = questions
        .find(filter, options)
        .await?
        .map_ok(QuestionSummary::from)
        .try_collect()
        .await?;
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };

    use super::*;

    #[backend_test]
    async fn root_redirects_to_listing(client: Client) {
        let response = client.get(uri!(root)).dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/polls"));
    }

    #[backend_test]
    async fn empty_listing(client: Client) {
        let response = client.get(uri!(index)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("No polls are available."));
    }

    #[backend_test]
    async fn listing_links_to_detail(client: Client, questions: Coll<Question>) {
        questions
            .insert_many([Question::example2(), Question::future_example()], None)
            .await
            .unwrap();

        let response = client.get(uri!(index)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("Favourite colour?"));
        assert!(body.contains(&format!("href=\"/polls/{}\"", Question::example2().id)));
        // Not published yet.
        assert!(!body.contains("Who will win?"));
    }

    #[backend_test]
    async fn listing_is_bounded_and_ordered(db: Database) {
        let questions = Coll::<Question>::from_db(&db);
        let aged = (1..=8)
            .map(|n| Question::aged(n, Duration::hours(i64::from(n))))
            .chain([Question::future_example()])
            .collect::<Vec<_>>();
        questions.insert_many(aged, None).await.unwrap();

        let latest = latest_questions(&questions, Utc::now()).await.unwrap();
        assert_eq!(latest.len(), LATEST_QUESTIONS_LIMIT as usize);
        assert!(latest
            .windows(2)
            .all(|pair| pair[0].pub_date >= pair[1].pub_date));
        let ids = latest.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[backend_test]
    async fn listing_ties_newest_id_first(questions: Coll<Question>) {
        let mut first = Question::aged(1, Duration::hours(1));
        let mut second = Question::aged(2, Duration::hours(1));
        second.pub_date = first.pub_date;
        first.question_text = "first".to_string();
        second.question_text = "second".to_string();
        questions.insert_many([first, second], None).await.unwrap();

        let latest = latest_questions(&questions, Utc::now()).await.unwrap();
        let ids = latest.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 1]);
    }

    #[backend_test]
    async fn detail_shows_voting_form(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let response = client.get(uri!(detail(1001))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("action=\"/polls/1001/vote\""));
        assert!(body.contains("value=\"2001\""));
        assert!(body.contains("value=\"2002\""));
        assert!(body.contains("The sky"));
        assert!(!body.contains("select a choice"));
    }

    #[backend_test]
    async fn unknown_question_is_not_found(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let response = client.get(uri!(detail(42))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get(uri!(results(42))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .post(uri!(vote(42)))
            .header(ContentType::Form)
            .body("choice=2001")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        // Not even a valid ID.
        let response = client.get("/polls/not-a-number").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        // The existing question was not touched by the failed vote.
        let stored = questions
            .find_one(question_id_filter(1001), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.choices, Question::example1().choices);
    }

    #[backend_test]
    async fn results_show_tallies(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let response = client.get(uri!(results(1001))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("Not much -- 0 votes"));
        assert!(body.contains("The sky -- 3 votes"));
        assert!(body.contains("href=\"/polls/1001\""));
    }

    #[backend_test]
    async fn vote_redirects_to_results(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let response = client
            .post(uri!(vote(1001)))
            .header(ContentType::Form)
            .body("choice=2001")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(
            response.headers().get_one("Location"),
            Some(uri!(results(1001)).to_string().as_str())
        );

        let stored = questions
            .find_one(question_id_filter(1001), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.choice(2001).unwrap().votes, 1);
        assert_eq!(stored.choice(2002).unwrap().votes, 3);

        // Following the redirect shows the new tally.
        let response = client.get(uri!(results(1001))).dispatch().await;
        let body = response.into_string().await.unwrap();
        assert!(body.contains("Not much -- 1 vote<"));
    }

    #[backend_test]
    async fn invalid_selection_redisplays_form(client: Client, questions: Coll<Question>) {
        questions
            .insert_many([Question::example1(), Question::example2()], None)
            .await
            .unwrap();

        // Missing field, garbage, and a choice from another question.
        for body in ["", "choice=", "choice=banana", "choice=2003"] {
            let response = client
                .post(uri!(vote(1001)))
                .header(ContentType::Form)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok, "body {body:?}");
            let page = response.into_string().await.unwrap();
            assert!(page.contains("select a choice."), "body {body:?}");
            assert!(page.contains("action=\"/polls/1001/vote\""));
        }

        // No choice anywhere was modified.
        for expected in [Question::example1(), Question::example2()] {
            let stored = questions
                .find_one(question_id_filter(expected.id), None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.choices, expected.choices);
        }
    }

    #[backend_test]
    async fn vote_without_form_body_redisplays_form(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let no_body = client.post(uri!(vote(1001)));
        let json_body = client
            .post(uri!(vote(1001)))
            .header(ContentType::JSON)
            .body(r#"{"choice": 2001}"#);
        for request in [no_body, json_body] {
            let response = request.dispatch().await;
            assert_eq!(response.status(), Status::Ok);
            let page = response.into_string().await.unwrap();
            assert!(page.contains("select a choice."));
            assert!(page.contains("action=\"/polls/1001/vote\""));
        }

        let stored = questions
            .find_one(question_id_filter(1001), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.choices, Question::example1().choices);
    }

    #[backend_test]
    async fn voting_twice_counts_twice(client: Client, questions: Coll<Question>) {
        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        for _ in 0..2 {
            let response = client
                .post(uri!(vote(1001)))
                .header(ContentType::Form)
                .body("choice=2002")
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::SeeOther);
        }

        let stored = questions
            .find_one(question_id_filter(1001), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.choice(2002).unwrap().votes, 5);
        assert_eq!(stored.choice(2001).unwrap().votes, 0);
    }

    #[backend_test]
    async fn concurrent_requests_all_count(client: Client, questions: Coll<Question>) {
        const VOTERS: usize = 20;

        questions
            .insert_one(Question::example1(), None)
            .await
            .unwrap();

        let requests = (0..VOTERS).map(|_| {
            client
                .post(uri!(vote(1001)))
                .header(ContentType::Form)
                .body("choice=2001")
                .dispatch()
        });
        let responses = rocket::futures::future::join_all(requests).await;
        assert!(responses
            .iter()
            .all(|response| response.status() == Status::SeeOther));

        let stored = questions
            .find_one(question_id_filter(1001), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.choice(2001).unwrap().votes, VOTERS as u32);
    }
}
