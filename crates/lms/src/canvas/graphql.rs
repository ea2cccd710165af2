pub const GRADEBOOK_QUERY: &str = r#"
query Gradebook($courseId: ID!) {
  course(id: $courseId) {
    assignmentGroupsConnection {
      nodes {
        _id
        name
        groupWeight
        rules {
          dropHighest
          dropLowest
          neverDrop { _id }
        }
        assignmentsConnection {
          nodes {
            _id
            pointsPossible
            submissionsConnection {
              nodes {
                score
                user { _id }
              }
            }
          }
        }
        gradesConnection {
          nodes {
            currentScore
            enrollment {
              _id
              user { _id }
            }
          }
        }
      }
    }
  }
}
"#;

pub const SET_OVERRIDE_SCORE_MUTATION: &str = r#"
mutation SetOverrideScore($enrollmentId: ID!, $overrideScore: Float) {
  setOverrideScore(input: { enrollmentId: $enrollmentId, overrideScore: $overrideScore }) {
    errors {
      attribute
      message
    }
  }
}
"#;
