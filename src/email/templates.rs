use crate::pbis::models::Guardian;

use super::models::{Winner, WinnerKind};

const SIGNATURE: &str = "The PBIS Team\n\"Go the distance; dare to explore\"";

/// "Last, First" becomes "First Last"; anything else is left alone
pub fn format_guardian_name(name: &str) -> String {
    match name.split_once(',') {
        Some((last, first)) => {
            let first = first
                .split(',')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} {}", first, last.trim())
        }
        None => name.to_string(),
    }
}

fn level_text(winner: &Winner) -> String {
    winner
        .level
        .map(|level| level.to_string())
        .unwrap_or_else(|| "a new level".to_string())
}

/// Subject and body sent to the winner
pub fn winner_email(winner: &Winner) -> (String, String) {
    match winner.kind {
        WinnerKind::Personal => (
            "🎉 Congratulations! You Leveled Up in PBIS!".to_string(),
            format!(
                "Dear {name},\n\n\
                 Congratulations! You have leveled up to Level {level} in our PBIS program! \
                 This achievement demonstrates your commitment to our three habits of work: \
                 Respect, Responsibility, and Perseverance.\n\n\
                 Please report to the Bus Lobby to claim your well-deserved reward. Your positive \
                 behavior and dedication to creating a positive academic and social environment \
                 are truly commendable!\n\n\
                 Keep up the excellent work!\n\n{signature}",
                name = winner.name,
                level = level_text(winner),
                signature = SIGNATURE,
            ),
        ),
        WinnerKind::TaTeam => (
            "🎉 Congratulations! Your TA Team Leveled Up!".to_string(),
            format!(
                "Dear {name},\n\n\
                 Congratulations! Your TA team has completed their BINGO Box and reached Level \
                 {level}! This achievement reflects the collective effort and positive behavior \
                 of your entire team.\n\n\
                 You will be notified when you should receive your team celebration. Your \
                 leadership and the team's commitment to our three habits of work: Respect, \
                 Responsibility, and Perseverance, have made this possible.\n\n\
                 Congratulations on leading by example!\n\n{signature}",
                name = winner.name,
                level = level_text(winner),
                signature = SIGNATURE,
            ),
        ),
        WinnerKind::Staff => (
            "🎉 Congratulations! You Won the Weekly PBIS Staff Drawing!".to_string(),
            format!(
                "Dear {name},\n\n\
                 Congratulations! You have been selected as a winner in this week's PBIS staff \
                 drawing!\n\n\
                 Your commitment to supporting our students and reinforcing positive behavior \
                 has been recognized. Please check with the main office for details about your \
                 reward.\n\n\
                 Thank you for all you do to support our PBIS program and for continuing to \
                 encourage students to be positive members of our falcon community!\n\n{signature}",
                name = winner.name,
                signature = SIGNATURE,
            ),
        ),
        WinnerKind::RandomDrawing => {
            let teacher_line = winner
                .ta_teacher
                .as_ref()
                .map(|teacher| {
                    format!(
                        "Your TA teacher {} should be proud of your excellent behavior!",
                        teacher
                    )
                })
                .unwrap_or_default();
            (
                "🎉 Congratulations! You Won the PBIS Random Drawing!".to_string(),
                format!(
                    "Dear {name},\n\n\
                     Congratulations! You have been selected as a winner in this week's PBIS \
                     random drawing!\n\n\
                     Your positive behavior and demonstration of our three habits of work: \
                     Respect, Responsibility, and Perseverance, have earned you this reward. \
                     Please report to the Bus Lobby to claim your prize.\n\n\
                     {teacher_line}\n\n\
                     Keep up the great work!\n\n{signature}",
                    name = winner.name,
                    teacher_line = teacher_line,
                    signature = SIGNATURE,
                ),
            )
        }
    }
}

fn guardian_greeting(guardian: &Guardian) -> String {
    let name = format_guardian_name(&guardian.name);
    if name.trim().is_empty() {
        "Dear Parents and Guardians,".to_string()
    } else {
        format!("Dear {},", name.trim())
    }
}

/// Subject and body sent to one of a student winner's guardians. `None` for staff and team winners.
pub fn guardian_email(winner: &Winner, guardian: &Guardian) -> Option<(String, String)> {
    let greeting = guardian_greeting(guardian);
    match winner.kind {
        WinnerKind::Personal => Some((
            "🎉 Great News! Your Child Leveled Up in PBIS!".to_string(),
            format!(
                "{greeting}\n\n\
                 Congratulations! Your child has leveled up to Level {level}! This means that \
                 your child has earned and submitted at least 25 PBIS cards! Remember that PBIS \
                 cards are awarded by staff to students for following expectations and creating \
                 a positive academic and social environment. Earned and submitted cards benefit \
                 not just the individual student, but also the TA and school as a whole - so \
                 keep encouraging your child to submit their cards as they earn them!\n\n\
                 Individual levels are based on a tiered system, with each level requiring a \
                 set number of cards which rises every 2 levels. As the number of required \
                 cards increases, so does the number of rewards available to students.\n\n\
                 Check in with your child to find out what prize they have earned. Be sure to \
                 congratulate them on modeling our three habits of work: Respect, \
                 Responsibility, and Perseverance!\n\n\
                 Thank you for continuing to encourage your child to be a positive member of \
                 our falcon community.\n\n{signature}",
                greeting = greeting,
                level = level_text(winner),
                signature = SIGNATURE,
            ),
        )),
        WinnerKind::RandomDrawing => {
            let teacher_line = winner
                .ta_teacher
                .as_ref()
                .map(|teacher| {
                    format!(
                        "Their TA teacher {} has been impressed with their excellent behavior!",
                        teacher
                    )
                })
                .unwrap_or_default();
            Some((
                "🎉 Congratulations! Your Child Won the PBIS Drawing!".to_string(),
                format!(
                    "{greeting}\n\n\
                     Congratulations! Your child has been selected as a winner in this week's \
                     PBIS random drawing! This recognition comes as a result of their positive \
                     behavior and demonstration of our three habits of work: Respect, \
                     Responsibility, and Perseverance.\n\n\
                     Your child should report to the Bus Lobby to claim their prize.\n\n\
                     {teacher_line}\n\n\
                     Please join us in celebrating this achievement with your child and continue \
                     to encourage them to be a positive member of our falcon community!\n\n\
                     {signature}",
                    greeting = greeting,
                    teacher_line = teacher_line,
                    signature = SIGNATURE,
                ),
            ))
        }
        WinnerKind::TaTeam | WinnerKind::Staff => None,
    }
}
