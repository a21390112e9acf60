//! The CodeRush 2025 knowledge base. Fixed at build time; loaded once at
//! process start and never mutated.

use super::store::KnowledgeDocument;

/// Official map link for the venue. Location answers must always carry it.
pub const VENUE_MAP_LINK: &str = "https://maps.google.com/?q=UCSC+Main+Auditorium";

fn doc(
    id: &str,
    category: &str,
    question: &str,
    answer: &str,
    keywords: &[&str],
    priority: i32,
) -> KnowledgeDocument {
    KnowledgeDocument {
        id: id.to_string(),
        category: category.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        priority,
    }
}

pub fn documents() -> Vec<KnowledgeDocument> {
    vec![
        doc(
            "event-date",
            "event",
            "When is CodeRush 2025 happening?",
            "CodeRush 2025 runs on Saturday, 15 November 2025. Check-in opens at 8.00 AM, \
             the opening ceremony starts at 9.00 AM, and hacking runs until 9.00 PM the same day.",
            &["date", "when", "time", "schedule", "day", "november", "start", "begin"],
            10,
        ),
        doc(
            "event-location",
            "location",
            "Where is CodeRush 2025 held?",
            &format!(
                "CodeRush 2025 takes place at the UCSC Main Auditorium. \
                 Directions: {VENUE_MAP_LINK} — parking is available behind the building."
            ),
            &["venue", "location", "where", "place", "map", "auditorium", "directions", "address"],
            10,
        ),
        doc(
            "registration-how",
            "registration",
            "How do I register my team?",
            "Register right here in this chat: send your team name to begin, pick your batch, \
             and then provide each member's full name, index number, and email one at a time. \
             Registration closes on 8 November 2025 or when 100 teams have signed up.",
            &["register", "registration", "signup", "sign", "join", "enroll", "apply", "deadline"],
            9,
        ),
        doc(
            "registration-edit",
            "registration",
            "Can I change my team details after registering?",
            "Yes. Once your registration is confirmed you can submit an edit with the updated \
             team name, batch, and member list, and we will replace the old details. \
             Changes are not possible mid-registration — finish the flow first, then edit.",
            &["edit", "change", "update", "modify", "correct", "mistake", "replace"],
            6,
        ),
        doc(
            "team-size",
            "team",
            "How many members can a team have?",
            "Every team has exactly 4 members including the team leader. All members must \
             belong to the same batch, and each student may register with only one team.",
            &["team", "members", "size", "how many", "people", "leader", "four"],
            9,
        ),
        doc(
            "team-eligibility",
            "team",
            "Who can take part in CodeRush 2025?",
            "CodeRush 2025 is open to undergraduates of the 23 and 24 batches. Your index \
             number must carry your batch prefix, so mixed-batch teams are not allowed.",
            &["eligible", "eligibility", "batch", "who", "participate", "undergraduate", "allowed"],
            7,
        ),
        doc(
            "submission-how",
            "submission",
            "How do we submit our project?",
            "Submit through the submission form linked on the event page before 9.00 PM on \
             hack day. Upload your repository link and a short demo video; late submissions \
             are not accepted.",
            &["submit", "submission", "project", "upload", "demo", "video", "repository", "repo"],
            8,
        ),
        doc(
            "judging",
            "submission",
            "How are projects judged?",
            "Projects are scored on innovation, technical depth, completeness, and the demo \
             pitch. Judging happens in two rounds: a booth review at 7.00 PM and final \
             pitches from the top eight teams.",
            &["judge", "judging", "criteria", "score", "marks", "evaluate", "pitch", "winner"],
            6,
        ),
        doc(
            "tech-stack",
            "technology",
            "What technologies can we use?",
            "Any language, framework, or cloud service is fine as long as the code is written \
             during the event. Bring your own laptops; power, Wi-Fi, and a limited pool of \
             monitors are provided on site.",
            &["technology", "tech", "stack", "language", "framework", "laptop", "wifi", "tools"],
            6,
        ),
        doc(
            "rules",
            "guidelines",
            "What are the rules of CodeRush 2025?",
            "All code must be written during the event — pre-built projects are disqualified. \
             Open-source libraries are allowed with attribution. Teams must stay within the \
             venue during hacking hours, and organizer decisions are final.",
            &["rules", "guidelines", "allowed", "plagiarism", "disqualified", "conduct", "regulations"],
            7,
        ),
        doc(
            "prizes",
            "prizes",
            "What are the prizes?",
            "The winning team takes LKR 100,000, runners-up LKR 60,000, and second runners-up \
             LKR 30,000. Every participant receives a certificate and event swag.",
            &["prize", "prizes", "award", "reward", "money", "certificate", "swag", "win"],
            8,
        ),
        doc(
            "cost",
            "registration",
            "Is there a registration fee?",
            "No — CodeRush 2025 is completely free to enter. Meals and refreshments during \
             hack day are provided for all registered participants.",
            &["fee", "cost", "price", "free", "pay", "payment", "charge"],
            5,
        ),
        doc(
            "food",
            "event",
            "Is food provided during the event?",
            "Yes, lunch, dinner, and snacks are provided for all registered participants. \
             Dietary requirements can be noted at check-in.",
            &["food", "meals", "lunch", "dinner", "snacks", "refreshments", "drinks"],
            4,
        ),
        doc(
            "contact",
            "general",
            "How do I contact the organizers?",
            "Reach the organizing committee at coderush@ucsc.cmb.ac.lk or message the \
             official WhatsApp line listed on the event page. We usually reply within a day.",
            &["contact", "organizer", "email", "phone", "whatsapp", "reach", "support"],
            5,
        ),
        doc(
            "about",
            "general",
            "What is CodeRush 2025?",
            "CodeRush 2025 is the annual 12-hour hackathon of the UCSC, where teams of four \
             build and pitch a working product in a single day. It is the fifth edition of \
             the event, themed around practical AI this year.",
            &["coderush", "hackathon", "about", "event", "what", "overview", "theme"],
            6,
        ),
    ]
}
