/// Instructions sent alongside every screenshot.
pub const EXTRACTION_PROMPT: &str = r#"
Analyze the provided image. It shows the post-match player performance screen of a football game (FIFA / EA SPORTS FC).

Extract the data described below and return it as ONE JSON object and nothing else:
no explanatory text, no markdown, no comments.

{
  "team_name": "string",                 // team name, top right
  "featured_player": {                   // box at the top left
    "name": "string",
    "overall_rating": integer,           // OVR
    "match_rating": float                // rating next to the name
  },
  "player_list": [                       // table on the left, every row in display order
    {
      "position": "string",              // POS
      "name": "string",
      "match_rating": float,             // MR
      "goals": integer,                  // G
      "assists": integer                 // AST
    }
  ],
  "detailed_stats_category": "string",   // selected tab in the top menu: "Summary", "Shooting",
                                         // "Passing", "Possession", "Defending" or "Goalkeeping"
  "selected_player_detailed_stats": {    // right-hand panel, for the highlighted player
    "player_name": "string",
    "stats": {
      // stat name -> number, in the order shown.
      // Summary: take the first value of each stat.
      // Shooting, Passing, Possession, Defending, Goalkeeping: take the single value shown.
      // Passing / Possession line breaks: only when a "Forward Line Breaks",
      // "Midfield Line Breaks" or "Defensive Line Breaks" header is visible directly
      // above them, extract "Through Attempted", "Through Completed", "Around Attempted",
      // "Around Completed", "Over Attempted", "Over Completed" with the key prefixed by
      // "Forward ", "Midfield " or "Defensive " to match the header. Skip line break stats
      // whose header is not visible, and skip a header with no stats under it.
    }
  },
  "selected_team_detailed_stats": {      // only when detailed_stats_category is "Summary"
    "stats": {
      // stat name -> second value of each stat in the right-hand panel
    }
  }
}

Examples of "stats":
  Summary:     "Goals": 1, "Shot Accuracy (%)": 75
  Possession:  "Possession (%)": 7, "Dribbles": 19, "Forward Through Attempted": 0
  Goalkeeping: "Shots Against": 2, "Save Success Rate(%)": 10, "Saves": 0, "Punch Saves": 0

Transcribe all text exactly and report numbers as integers or floats as they appear.
"#;
