use rand::seq::IndexedRandom;

use crate::models::quiz::QuizQuestion;

// (text, options, tag); ids are 1-based positions in this list.
const POOL: &[(&str, [&str; 2], &str)] = &[
    ("Would you rather have a cat or a dog?", ["Cat", "Dog"], "pets"),
    ("Would you rather have coffee or tea?", ["Coffee", "Tea"], "drinks"),
    ("Sweet or savory breakfast?", ["Sweet", "Savory"], "food"),
    ("Morning person or night owl?", ["Morning", "Night"], "lifestyle"),
    ("Beach or mountains?", ["Beach", "Mountains"], "travel"),
    ("Would you rather summer or winter?", ["Summer", "Winter"], "season"),
    ("Would you rather pizza or burgers?", ["Pizza", "Burgers"], "food"),
    ("Would you rather books or movies?", ["Books", "Movies"], "entertainment"),
    ("Would you rather train or plane?", ["Train", "Plane"], "travel"),
    ("Would you rather car or bicycle?", ["Car", "Bicycle"], "transport"),
    ("Would you rather android or ios?", ["Android", "iOS"], "technology"),
    ("Would you rather pc or mac?", ["PC", "Mac"], "technology"),
    ("Would you rather chrome or firefox?", ["Chrome", "Firefox"], "browser"),
    ("Would you rather call or text?", ["Call", "Text"], "communication"),
    ("Would you rather hug or handshake?", ["Hug", "Handshake"], "greeting"),
    ("Would you rather board games or video games?", ["Board Games", "Video Games"], "games"),
    ("Would you rather science or arts?", ["Science", "Arts"], "subject"),
    ("Would you rather sneakers or sandals?", ["Sneakers", "Sandals"], "footwear"),
    ("Would you rather black or white?", ["Black", "White"], "color"),
    ("Would you rather netflix or youtube?", ["Netflix", "YouTube"], "streaming"),
    ("Would you rather stairs or elevator?", ["Stairs", "Elevator"], "facility"),
    ("Would you rather bath or shower?", ["Bath", "Shower"], "hygiene"),
    ("Would you rather pancakes or waffles?", ["Pancakes", "Waffles"], "breakfast"),
    ("Would you rather tea or juice?", ["Tea", "Juice"], "drink"),
    ("Would you rather salty or sweet?", ["Salty", "Sweet"], "taste"),
    ("Would you rather gold or silver?", ["Gold", "Silver"], "metal"),
    ("Would you rather comedy or drama?", ["Comedy", "Drama"], "movie"),
    ("Would you rather football or basketball?", ["Football", "Basketball"], "sports"),
    ("Would you rather pen or pencil?", ["Pen", "Pencil"], "stationery"),
    ("Would you rather chocolate or vanilla?", ["Chocolate", "Vanilla"], "flavor"),
    ("Would you rather pool or beach?", ["Pool", "Beach"], "location"),
    ("Would you rather phone or laptop?", ["Phone", "Laptop"], "device"),
    ("Would you rather twitter or instagram?", ["Twitter", "Instagram"], "social"),
    ("Would you rather morning gym or evening gym?", ["Morning Gym", "Evening Gym"], "exercise"),
    ("Would you rather yoga or pilates?", ["Yoga", "Pilates"], "exercise"),
    ("Would you rather city or countryside?", ["City", "Countryside"], "travel"),
    ("Would you rather camping or hotel?", ["Camping", "Hotel"], "accommodation"),
    ("Would you rather museum or zoo?", ["Museum", "Zoo"], "place"),
    ("Would you rather sushi or tacos?", ["Sushi", "Tacos"], "food"),
    ("Would you rather hotdog or burger?", ["Hotdog", "Burger"], "food"),
    ("Would you rather rain or snow?", ["Rain", "Snow"], "weather"),
    ("Would you rather sunrise or sunset?", ["Sunrise", "Sunset"], "time"),
    ("Would you rather rock or pop?", ["Rock", "Pop"], "music"),
    ("Would you rather classical or hip-hop?", ["Classical", "Hip-hop"], "music"),
    ("Would you rather e-book or printed book?", ["E-book", "Printed Book"], "reading"),
    ("Would you rather online shopping or in-store shopping?", ["Online Shopping", "In-store Shopping"], "shopping"),
];

pub fn pool_size() -> usize {
    POOL.len()
}

pub fn question_by_id(id: i32) -> Option<QuizQuestion> {
    let index = usize::try_from(id).ok()?.checked_sub(1)?;
    POOL.get(index).map(|entry| to_question(index, entry))
}

/// Draws `count` distinct questions from the pool in random order.
pub fn sample_questions(count: usize) -> Vec<QuizQuestion> {
    let indexed: Vec<usize> = (0..POOL.len()).collect();
    indexed
        .choose_multiple(&mut rand::rng(), count)
        .map(|&index| to_question(index, &POOL[index]))
        .collect()
}

fn to_question(index: usize, (text, options, tag): &(&str, [&str; 2], &str)) -> QuizQuestion {
    QuizQuestion {
        id: index as i32 + 1,
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        tag: tag.to_string(),
    }
}
