pub mod client {
    use anyhow::Result;
    use reqwest::Client;

    use blast_common::{
        Attendance, Blast, BlastId, CreateBlastRequest, FriendRequest, FriendRequestId,
        FriendRequestRef, IncomingFriendRequest, ReceivedBlast, RespondRequest, SendFriendRequest,
        SentBlast, Session, SessionUser, SignInRequest, SignUpRequest, UserId, UserSummary,
        TOKEN_HEADER,
    };

    pub async fn sign_up(client: &Client, server: &str, name: &str, email: &str, password: &str) -> Result<Session> {
        Ok(client
            .post(format!("{server}/signup"))
            .json(&SignUpRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn sign_in(client: &Client, server: &str, email: &str, password: &str) -> Result<Session> {
        Ok(client
            .post(format!("{server}/signin"))
            .json(&SignInRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn sign_out(client: &Client, server: &str, session: &Session) -> Result<()> {
        client
            .post(format!("{server}/signout"))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn current_user(client: &Client, server: &str, token: &str) -> Result<SessionUser> {
        Ok(client
            .get(format!("{server}/session"))
            .header(TOKEN_HEADER, token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn get_friends(client: &Client, server: &str, session: &Session) -> Result<Vec<UserSummary>> {
        Ok(client
            .get(format!("{server}/{}/get/friends", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn friend_suggestions(client: &Client, server: &str, session: &Session, name: &str) -> Result<Vec<UserSummary>> {
        Ok(client
            .get(format!("{server}/{}/get/friend-suggestions", session.user.uid.0))
            .query(&[("name", name)])
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn send_friend_request(client: &Client, server: &str, session: &Session, receiver: &UserId) -> Result<FriendRequest> {
        Ok(client
            .post(format!("{server}/{}/post/send-friend-request", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .json(&SendFriendRequest { receiver_id: receiver.clone() })
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn rec_friend_requests(client: &Client, server: &str, session: &Session) -> Result<Vec<IncomingFriendRequest>> {
        Ok(client
            .get(format!("{server}/{}/get/rec-friend-requests", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn sent_friend_requests(client: &Client, server: &str, session: &Session) -> Result<Vec<FriendRequest>> {
        Ok(client
            .get(format!("{server}/{}/get/sent-friend-requests", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn accept_friend_request(client: &Client, server: &str, session: &Session, request_id: &FriendRequestId) -> Result<()> {
        client
            .post(format!("{server}/{}/post/accept-friend-request", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .json(&FriendRequestRef { request_id: request_id.clone() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn reject_friend_request(client: &Client, server: &str, session: &Session, request_id: &FriendRequestId) -> Result<()> {
        client
            .post(format!("{server}/{}/post/reject-friend-request", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .json(&FriendRequestRef { request_id: request_id.clone() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn create_blast(client: &Client, server: &str, session: &Session, blast: &CreateBlastRequest) -> Result<Blast> {
        Ok(client
            .post(format!("{server}/{}/post/create-blast", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .json(blast)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn respond_blast(client: &Client, server: &str, session: &Session, blast_id: &BlastId, response: Attendance) -> Result<Blast> {
        Ok(client
            .post(format!("{server}/{}/post/respond-blast", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .json(&RespondRequest { blast_id: blast_id.clone(), response })
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn inbox(client: &Client, server: &str, session: &Session) -> Result<Vec<ReceivedBlast>> {
        Ok(client
            .get(format!("{server}/{}/get/inbox", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }

    pub async fn sent_blasts(client: &Client, server: &str, session: &Session) -> Result<Vec<SentBlast>> {
        Ok(client
            .get(format!("{server}/{}/get/sent-blasts", session.user.uid.0))
            .header(TOKEN_HEADER, &session.token)
            .send()
            .await?
            .error_for_status()?
            .json::<_>()
            .await?)
    }
}
